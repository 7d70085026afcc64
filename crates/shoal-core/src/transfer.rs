//! Transfer requests and the rules of their lifecycle.
//!
//! A request moves one size class between two locations. Requests created in
//! one user action share a `group_id` and are approved or declined together.
//!
//! ```text
//! pending ──► approved ──► completed
//!    │
//!    └──────► declined
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  batch::{SizeClass, check_positive},
  inventory::{Snapshot, Stock},
  location::{StorageLocation, require_active},
};

// ─── Status ──────────────────────────────────────────────────────────────────

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransferStatus {
  Pending,
  Approved,
  Completed,
  Declined,
}

impl TransferStatus {
  pub fn can_transition_to(self, next: TransferStatus) -> bool {
    use TransferStatus::*;
    matches!(
      (self, next),
      (Pending, Approved) | (Approved, Completed) | (Pending, Declined)
    )
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Declined)
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
  pub transfer_id:             Uuid,
  /// Shared by every request created in the same action.
  pub group_id:                Uuid,
  pub source_location_id:      Uuid,
  pub destination_location_id: Uuid,
  pub size_class:              SizeClass,
  pub requested_pieces:        i64,
  pub requested_mass_grams:    i64,
  /// Mass actually moved by FIFO depletion; set on completion.
  pub moved_mass_grams:        Option<i64>,
  pub status:                  TransferStatus,
  pub requested_by:            String,
  /// Whoever approved or declined the request.
  pub approved_by:             Option<String>,
  pub created_at:              DateTime<Utc>,
  pub approved_at:             Option<DateTime<Utc>>,
  pub completed_at:            Option<DateTime<Utc>>,
  pub declined_at:             Option<DateTime<Utc>>,
  pub notes:                   Option<String>,
}

impl TransferRequest {
  pub fn requested(&self) -> Stock {
    Stock::new(self.requested_pieces, self.requested_mass_grams)
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::InventoryStore::create_transfer_batch`].
#[derive(Debug, Clone)]
pub struct NewTransferBatch {
  pub source_location_id:      Uuid,
  pub destination_location_id: Uuid,
  /// One request row is created per entry.
  pub sizes:                   BTreeMap<SizeClass, Stock>,
  pub requested_by:            String,
  pub notes:                   Option<String>,
}

/// Parameters for [`crate::store::InventoryStore::list_transfers`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferFilter {
  pub status:      Option<TransferStatus>,
  /// Matches either end of the transfer.
  pub location_id: Option<Uuid>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// How far a size class falls short of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
  pub size_class: SizeClass,
  pub requested:  Stock,
  pub available:  Stock,
}

/// Why a group member could not be approved. The member stays `pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
  InsufficientStock {
    requested: Stock,
    available: Stock,
  },
  InsufficientCapacity {
    required_grams:  i64,
    available_grams: i64,
  },
  InvalidLocation {
    location_id: Uuid,
    reason:      String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFailure {
  pub transfer_id: Uuid,
  pub size_class:  SizeClass,
  pub reason:      FailureReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
  pub group_id: Uuid,
  /// Completed members, in size-class order.
  pub approved: Vec<TransferRequest>,
  pub failed:   Vec<MemberFailure>,
}

impl ApprovalOutcome {
  pub fn approved_count(&self) -> usize { self.approved.len() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclineOutcome {
  pub group_id: Uuid,
  pub declined: Vec<TransferRequest>,
}

impl DeclineOutcome {
  pub fn declined_count(&self) -> usize { self.declined.len() }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate a whole creation request. Any failure rejects every size class.
///
/// Shortfalls are collected for all sizes before failing so the caller can
/// show each one.
pub fn validate_new_transfer(
  input: &NewTransferBatch,
  source: Option<&StorageLocation>,
  destination: Option<&StorageLocation>,
  snapshot: &Snapshot,
) -> Result<()> {
  if input.source_location_id == input.destination_location_id {
    return Err(Error::SameLocation(input.source_location_id));
  }
  if input.sizes.is_empty() {
    return Err(Error::InvalidQuantity(
      "a transfer must name at least one size class".into(),
    ));
  }
  for stock in input.sizes.values() {
    check_positive(stock.pieces, stock.mass_grams)?;
  }

  require_active(input.source_location_id, source)?;
  require_active(input.destination_location_id, destination)?;

  let shortfalls: Vec<StockShortfall> = input
    .sizes
    .iter()
    .filter_map(|(&size_class, requested)| {
      let available = snapshot.available(input.source_location_id, size_class);
      (!available.covers(requested)).then_some(StockShortfall {
        size_class,
        requested: *requested,
        available,
      })
    })
    .collect();
  if !shortfalls.is_empty() {
    return Err(Error::InsufficientStock(shortfalls));
  }

  let required_grams = Stock::try_sum(input.sizes.values().copied())?.mass_grams;
  let available_grams =
    snapshot.available_capacity(input.destination_location_id);
  if required_grams > available_grams {
    return Err(Error::InsufficientCapacity {
      location_id: input.destination_location_id,
      required_grams,
      available_grams,
    });
  }

  Ok(())
}

/// Re-check one pending member's locations and source stock against the
/// current snapshot at approval time.
///
/// Destination capacity is not checked here: it is judged against the mass
/// the depletion plan actually moves, which the caller only knows after
/// planning.
pub fn check_member(
  request: &TransferRequest,
  source: Option<&StorageLocation>,
  destination: Option<&StorageLocation>,
  snapshot: &Snapshot,
) -> std::result::Result<(), FailureReason> {
  for (id, found) in [
    (request.source_location_id, source),
    (request.destination_location_id, destination),
  ] {
    if let Err(Error::InvalidLocation { location_id, reason }) =
      require_active(id, found)
    {
      return Err(FailureReason::InvalidLocation { location_id, reason });
    }
  }

  let requested = request.requested();
  let available =
    snapshot.available(request.source_location_id, request.size_class);
  if !available.covers(&requested) {
    return Err(FailureReason::InsufficientStock { requested, available });
  }

  Ok(())
}
