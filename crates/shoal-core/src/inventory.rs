//! The inventory read model, computed from the ledger on demand, never
//! stored.
//!
//! All sums are taken in grams. Conversion to kilograms is the presentation
//! layer's job.

use std::{
  collections::{BTreeMap, HashMap},
  ops::Sub,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  batch::{Batch, SizeClass},
  location::{LocationKind, LocationStatus, StorageLocation},
};

// ─── Stock ───────────────────────────────────────────────────────────────────

/// A pieces/mass pair.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Stock {
  pub pieces:     i64,
  pub mass_grams: i64,
}

impl Stock {
  pub const ZERO: Stock = Stock { pieces: 0, mass_grams: 0 };

  pub fn new(pieces: i64, mass_grams: i64) -> Self { Self { pieces, mass_grams } }

  /// Whether `self` holds at least `other` in both dimensions.
  pub fn covers(&self, other: &Stock) -> bool {
    self.pieces >= other.pieces && self.mass_grams >= other.mass_grams
  }

  /// Fails with [`Error::QuantityOverflow`] instead of wrapping or
  /// panicking.
  pub fn checked_add(self, rhs: Stock) -> Result<Stock> {
    Ok(Stock::new(
      self
        .pieces
        .checked_add(rhs.pieces)
        .ok_or(Error::QuantityOverflow("pieces"))?,
      checked_grams(self.mass_grams, rhs.mass_grams)?,
    ))
  }

  pub fn try_sum(items: impl IntoIterator<Item = Stock>) -> Result<Stock> {
    items.into_iter().try_fold(Stock::ZERO, Stock::checked_add)
  }
}

fn checked_grams(a: i64, b: i64) -> Result<i64> {
  a.checked_add(b).ok_or(Error::QuantityOverflow("mass"))
}

/// Only used where `rhs` is already known to be covered by `self`.
impl Sub for Stock {
  type Output = Stock;

  fn sub(self, rhs: Stock) -> Stock {
    Stock::new(self.pieces - rhs.pieces, self.mass_grams - rhs.mass_grams)
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One batch's share of an inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchContribution {
  pub batch_id:             Uuid,
  pub source_batch_ref:     String,
  pub pieces:               i64,
  pub mass_grams:           i64,
  pub created_at:           DateTime<Utc>,
  pub processed_at:         DateTime<Utc>,
  pub farmer_name:          Option<String>,
  /// Set when the batch arrived by transfer.
  pub source_location_name: Option<String>,
  pub transfer_id:          Option<Uuid>,
}

impl From<&Batch> for BatchContribution {
  fn from(b: &Batch) -> Self {
    Self {
      batch_id:             b.batch_id,
      source_batch_ref:     b.source_batch_ref.clone(),
      pieces:               b.pieces,
      mass_grams:           b.mass_grams,
      created_at:           b.created_at,
      processed_at:         b.processed_at,
      farmer_name:          b.farmer_name.clone(),
      source_location_name: b
        .provenance
        .as_ref()
        .map(|p| p.source_location_name.clone()),
      transfer_id:          b.provenance.as_ref().map(|p| p.transfer_id),
    }
  }
}

/// Stock for one (location, size class), plus the owning location's
/// utilisation. A location without inventory yields a single row with
/// `size_class: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
  pub location_id:              Uuid,
  pub location_name:            String,
  pub location_kind:            LocationKind,
  pub location_status:          LocationStatus,
  pub capacity_grams:           i64,
  /// Sum of mass across every size class at the location.
  pub usage_grams:              i64,
  pub available_capacity_grams: i64,
  pub utilization_percent:      f64,
  pub size_class:               Option<SizeClass>,
  pub total_pieces:             i64,
  pub total_mass_grams:         i64,
  pub batch_count:              usize,
  /// Oldest first. This order is the FIFO depletion order.
  pub batches:                  Vec<BatchContribution>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// `usage / capacity` as a percentage rounded half up to two decimals; zero
/// for a zero-capacity location.
///
/// Rounded in integer hundredths of a percent so that exact halves such as
/// 1.005% are not lost to binary floating point.
pub fn utilization_percent(usage_grams: i64, capacity_grams: i64) -> f64 {
  if capacity_grams <= 0 {
    return 0.0;
  }
  let num = usage_grams as i128 * 10_000;
  let den = capacity_grams as i128;
  let hundredths = (2 * num + den).div_euclid(2 * den);
  hundredths as f64 / 100.0
}

/// Remaining room at a location, floored at zero.
pub fn available_capacity(usage_grams: i64, capacity_grams: i64) -> i64 {
  (capacity_grams - usage_grams).max(0)
}

/// Build the inventory read model from the full set of locations and
/// batches. Pure: the same inputs always produce the same rows.
///
/// Rows are ordered by location name, then size class. Within a row the
/// contributing batches are ordered by creation time; ties keep the order in
/// which `batches` supplied them.
///
/// Fails with [`Error::QuantityOverflow`] if a sum leaves the `i64` range.
pub fn aggregate(
  locations: &[StorageLocation],
  batches: &[Batch],
) -> Result<Vec<InventoryRow>> {
  let mut groups: HashMap<Uuid, BTreeMap<SizeClass, Vec<&Batch>>> =
    HashMap::new();
  for batch in batches.iter().filter(|b| !b.is_depleted()) {
    groups
      .entry(batch.location_id)
      .or_default()
      .entry(batch.size_class)
      .or_default()
      .push(batch);
  }

  let mut ordered: Vec<&StorageLocation> = locations.iter().collect();
  ordered.sort_by(|a, b| {
    a.name.cmp(&b.name).then_with(|| a.location_id.cmp(&b.location_id))
  });

  let mut rows = Vec::new();
  for location in ordered {
    let by_size = groups.remove(&location.location_id).unwrap_or_default();

    let usage_grams = by_size
      .values()
      .flatten()
      .try_fold(0_i64, |acc, b| checked_grams(acc, b.mass_grams))?;

    let base = InventoryRow {
      location_id:              location.location_id,
      location_name:            location.name.clone(),
      location_kind:            location.kind,
      location_status:          location.status,
      capacity_grams:           location.capacity_grams,
      usage_grams,
      available_capacity_grams: available_capacity(
        usage_grams,
        location.capacity_grams,
      ),
      utilization_percent:      utilization_percent(
        usage_grams,
        location.capacity_grams,
      ),
      size_class:               None,
      total_pieces:             0,
      total_mass_grams:         0,
      batch_count:              0,
      batches:                  Vec::new(),
    };

    if by_size.is_empty() {
      rows.push(base);
      continue;
    }

    for (size_class, mut members) in by_size {
      members.sort_by_key(|b| b.created_at);
      let total =
        Stock::try_sum(members.iter().map(|b| Stock::new(b.pieces, b.mass_grams)))?;
      rows.push(InventoryRow {
        size_class: Some(size_class),
        total_pieces: total.pieces,
        total_mass_grams: total.mass_grams,
        batch_count: members.len(),
        batches: members.into_iter().map(BatchContribution::from).collect(),
        ..base.clone()
      });
    }
  }
  Ok(rows)
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Point lookups over an aggregated inventory, used for validation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  stock:    HashMap<(Uuid, SizeClass), Stock>,
  usage:    HashMap<Uuid, i64>,
  capacity: HashMap<Uuid, i64>,
}

impl Snapshot {
  pub fn from_rows(rows: &[InventoryRow]) -> Self {
    let mut snapshot = Self::default();
    for row in rows {
      snapshot.usage.insert(row.location_id, row.usage_grams);
      snapshot.capacity.insert(row.location_id, row.capacity_grams);
      if let Some(size) = row.size_class {
        snapshot.stock.insert(
          (row.location_id, size),
          Stock::new(row.total_pieces, row.total_mass_grams),
        );
      }
    }
    snapshot
  }

  /// Stock currently available at `location_id` for `size_class`.
  pub fn available(&self, location_id: Uuid, size_class: SizeClass) -> Stock {
    self
      .stock
      .get(&(location_id, size_class))
      .copied()
      .unwrap_or_default()
  }

  pub fn available_capacity(&self, location_id: Uuid) -> i64 {
    let usage = self.usage.get(&location_id).copied().unwrap_or(0);
    let capacity = self.capacity.get(&location_id).copied().unwrap_or(0);
    available_capacity(usage, capacity)
  }

  /// Reflect a completed move so later checks in the same transaction see
  /// it. `moved` must have come out of a plan over the source's stock.
  pub fn apply_move(
    &mut self,
    source: Uuid,
    destination: Uuid,
    size_class: SizeClass,
    moved: Stock,
  ) -> Result<()> {
    let dest = self.stock.entry((destination, size_class)).or_default();
    *dest = dest.checked_add(moved)?;
    let dest_usage = self.usage.entry(destination).or_default();
    *dest_usage = checked_grams(*dest_usage, moved.mass_grams)?;

    let src = self.stock.entry((source, size_class)).or_default();
    *src = *src - moved;
    *self.usage.entry(source).or_default() -= moved.mass_grams;
    Ok(())
  }
}
