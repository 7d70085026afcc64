//! Batches: production output placed into a size class at a location.
//!
//! The ledger is append-mostly: production and transfer credits insert new
//! batches, transfer debits only ever reduce an existing one. A batch
//! reduced to zero stays in the ledger as an audit record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Largest piece count a single batch or transfer line may carry.
pub const MAX_PIECES: i64 = 1_000_000_000;

/// Largest mass, in grams, a single batch, transfer line or location
/// capacity may carry: one million tonnes. Far below `i64::MAX`, so sums
/// over realistic ledgers stay in range.
pub const MAX_MASS_GRAMS: i64 = 1_000_000_000_000;

// ─── Size class ──────────────────────────────────────────────────────────────

/// A discrete fish size grade, `0..=10`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct SizeClass(u8);

impl SizeClass {
  pub const MAX: u8 = 10;

  pub fn new(value: u8) -> Result<Self> {
    if value > Self::MAX {
      return Err(Error::InvalidQuantity(format!(
        "size class must be between 0 and {}, got {value}",
        Self::MAX
      )));
    }
    Ok(Self(value))
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for SizeClass {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> { Self::new(value) }
}

impl From<SizeClass> for u8 {
  fn from(s: SizeClass) -> Self { s.0 }
}

impl fmt::Display for SizeClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Where a batch's material came from when it arrived by transfer rather
/// than direct production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProvenance {
  pub source_location_id:   Uuid,
  /// Denormalised for audit display; survives later renames.
  pub source_location_name: String,
  pub transfer_id:          Uuid,
}

// ─── Batch ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
  pub batch_id:         Uuid,
  /// Label of the production/sorting batch this material originates from.
  pub source_batch_ref: String,
  /// The batch's current location.
  pub location_id:      Uuid,
  pub size_class:       SizeClass,
  pub pieces:           i64,
  pub mass_grams:       i64,
  /// FIFO key. Never rewritten, not even when the batch is partially
  /// depleted.
  pub created_at:       DateTime<Utc>,
  /// When the ledger recorded the batch.
  pub processed_at:     DateTime<Utc>,
  pub farmer_name:      Option<String>,
  pub provenance:       Option<TransferProvenance>,
}

impl Batch {
  pub fn is_depleted(&self) -> bool { self.pieces == 0 && self.mass_grams == 0 }
}

// ─── NewBatch ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::InventoryStore::record_production`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
  pub location_id:      Uuid,
  pub size_class:       SizeClass,
  pub pieces:           i64,
  pub mass_grams:       i64,
  pub source_batch_ref: String,
  pub farmer_name:      Option<String>,
  /// When sorting completed. Defaults to the time of recording.
  pub produced_at:      Option<DateTime<Utc>>,
}

impl NewBatch {
  /// Convenience constructor with the optional provenance fields unset.
  pub fn new(
    location_id: Uuid,
    size_class: SizeClass,
    pieces: i64,
    mass_grams: i64,
    source_batch_ref: impl Into<String>,
  ) -> Self {
    Self {
      location_id,
      size_class,
      pieces,
      mass_grams,
      source_batch_ref: source_batch_ref.into(),
      farmer_name: None,
      produced_at: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    check_positive(self.pieces, self.mass_grams)
  }
}

/// Both pieces and mass must be strictly positive and no larger than
/// [`MAX_PIECES`] and [`MAX_MASS_GRAMS`].
pub fn check_positive(pieces: i64, mass_grams: i64) -> Result<()> {
  if pieces <= 0 {
    return Err(Error::InvalidQuantity(format!(
      "piece count must be positive, got {pieces}"
    )));
  }
  if mass_grams <= 0 {
    return Err(Error::InvalidQuantity(format!(
      "mass must be positive, got {mass_grams}g"
    )));
  }
  if pieces > MAX_PIECES {
    return Err(Error::InvalidQuantity(format!(
      "piece count {pieces} exceeds the maximum of {MAX_PIECES}"
    )));
  }
  if mass_grams > MAX_MASS_GRAMS {
    return Err(Error::InvalidQuantity(format!(
      "mass {mass_grams}g exceeds the maximum of {MAX_MASS_GRAMS}g"
    )));
  }
  Ok(())
}
