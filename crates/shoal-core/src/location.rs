//! Storage locations, the registry's unit of record.
//!
//! A location carries only static and administrative attributes. Its usage
//! is never stored; it is derived from the batch ledger on every read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, batch::MAX_MASS_GRAMS};

/// What a location physically is.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationKind {
  ColdStorage,
  Freezer,
  ProcessingArea,
  Other,
}

/// Operating status. Locations are deactivated rather than deleted so
/// historical batches and transfers keep a valid reference.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LocationStatus {
  #[default]
  Active,
  Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
  pub location_id:    Uuid,
  pub name:           String,
  pub kind:           LocationKind,
  /// Total mass the location can hold, in grams.
  pub capacity_grams: i64,
  pub status:         LocationStatus,
  pub created_at:     DateTime<Utc>,
}

impl StorageLocation {
  pub fn is_active(&self) -> bool { self.status == LocationStatus::Active }

  /// Fail with [`Error::InvalidLocation`] unless the location is active.
  pub fn ensure_active(&self) -> Result<()> {
    if self.is_active() {
      Ok(())
    } else {
      Err(Error::invalid_location(
        self.location_id,
        format!("location {:?} is inactive", self.name),
      ))
    }
  }
}

/// Input to [`crate::store::InventoryStore::add_location`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocation {
  pub name:           String,
  pub kind:           LocationKind,
  pub capacity_grams: i64,
}

impl NewLocation {
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::InvalidQuantity("location name cannot be empty".into()));
    }
    if self.capacity_grams < 0 {
      return Err(Error::InvalidQuantity(format!(
        "capacity must not be negative, got {}g",
        self.capacity_grams
      )));
    }
    if self.capacity_grams > MAX_MASS_GRAMS {
      return Err(Error::InvalidQuantity(format!(
        "capacity {}g exceeds the maximum of {MAX_MASS_GRAMS}g",
        self.capacity_grams
      )));
    }
    Ok(())
  }
}

/// Resolve a location reference, turning absence into
/// [`Error::InvalidLocation`] and requiring it to be active.
pub fn require_active(
  location_id: Uuid,
  found: Option<&StorageLocation>,
) -> Result<&StorageLocation> {
  let location = found
    .ok_or_else(|| Error::invalid_location(location_id, "location does not exist"))?;
  location.ensure_active()?;
  Ok(location)
}
