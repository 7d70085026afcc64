//! First-in-first-out depletion planning.
//!
//! Depletion is driven by pieces. Batches are consumed oldest first; a batch
//! that is emptied gives up all of its remaining mass, a batch that is only
//! partly consumed gives up mass in proportion to the pieces taken.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  batch::Batch,
  inventory::Stock,
  transfer::StockShortfall,
};

/// A reduction to apply to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
  pub batch_id: Uuid,
  pub amount:   Stock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionPlan {
  /// In the order they must be applied.
  pub debits: Vec<Debit>,
  /// Sum of all debits; exactly what the destination receives.
  pub total:  Stock,
}

/// Mass given up when `take` of a batch's `pieces` are removed, rounded
/// half up.
pub fn proportional_mass(mass_grams: i64, pieces: i64, take: i64) -> i64 {
  if take >= pieces {
    return mass_grams;
  }
  let num = mass_grams as i128 * take as i128;
  let den = pieces as i128;
  ((2 * num + den) / (2 * den)) as i64
}

/// Plan the removal of `pieces` from `batches`, which must already be in
/// FIFO order and belong to one (location, size class).
///
/// Fails with [`Error::InsufficientStock`] when the batches cannot cover
/// the request.
pub fn plan_depletion(batches: &[Batch], pieces: i64) -> Result<DepletionPlan> {
  if pieces <= 0 {
    return Err(Error::InvalidQuantity(format!(
      "piece count must be positive, got {pieces}"
    )));
  }

  let mut remaining = pieces;
  let mut debits = Vec::new();
  let mut total = Stock::ZERO;

  for batch in batches.iter().filter(|b| b.pieces > 0) {
    if remaining == 0 {
      break;
    }
    let take = remaining.min(batch.pieces);
    let amount = Stock::new(
      take,
      proportional_mass(batch.mass_grams, batch.pieces, take),
    );
    debits.push(Debit { batch_id: batch.batch_id, amount });
    total = total.checked_add(amount)?;
    remaining -= take;
  }

  if remaining > 0 {
    let available =
      Stock::try_sum(batches.iter().map(|b| Stock::new(b.pieces, b.mass_grams)))?;
    let size_class = batches
      .first()
      .map(|b| b.size_class)
      .ok_or_else(|| Error::InvalidQuantity("no batches to deplete".into()))?;
    return Err(Error::InsufficientStock(vec![StockShortfall {
      size_class,
      requested: Stock::new(pieces, 0),
      available,
    }]));
  }

  Ok(DepletionPlan { debits, total })
}

/// Apply `amount` to a batch's remaining stock. Going below zero is an
/// invariant breach and never clamps.
pub fn debit_batch(batch_id: Uuid, remaining: Stock, amount: Stock) -> Result<Stock> {
  if amount.pieces < 0 || amount.mass_grams < 0 || !remaining.covers(&amount) {
    return Err(Error::InsufficientBatchQuantity {
      batch_id,
      requested: amount,
      remaining,
    });
  }
  Ok(remaining - amount)
}
