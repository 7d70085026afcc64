//! Error types for `shoal-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  batch::SizeClass,
  inventory::Stock,
  transfer::{StockShortfall, TransferStatus},
};

#[derive(Debug, Error)]
pub enum Error {
  #[error("storage location not found: {0}")]
  LocationNotFound(Uuid),

  /// A referenced storage location does not exist or is inactive.
  #[error("invalid storage location {location_id}: {reason}")]
  InvalidLocation { location_id: Uuid, reason: String },

  #[error("invalid quantity: {0}")]
  InvalidQuantity(String),

  /// A running total left the representable range.
  #[error("{0} total out of range")]
  QuantityOverflow(&'static str),

  #[error("source and destination are the same location: {0}")]
  SameLocation(Uuid),

  #[error("insufficient stock for size classes {}", format_sizes(.0))]
  InsufficientStock(Vec<StockShortfall>),

  #[error(
    "insufficient capacity at {location_id}: {required_grams}g required, \
     {available_grams}g available"
  )]
  InsufficientCapacity {
    location_id:     Uuid,
    required_grams:  i64,
    available_grams: i64,
  },

  /// A depletion tried to take more than a batch holds. Always a
  /// consistency bug upstream, never a business condition.
  #[error(
    "batch {batch_id} holds {remaining:?}, cannot remove {requested:?}"
  )]
  InsufficientBatchQuantity {
    batch_id:  Uuid,
    requested: Stock,
    remaining: Stock,
  },

  #[error("concurrent modification; retries exhausted")]
  ConcurrentModification,

  #[error("batch not found: {0}")]
  BatchNotFound(Uuid),

  #[error("transfer request not found: {0}")]
  TransferNotFound(Uuid),

  #[error("transfer {transfer_id} cannot move from {from} to {to}")]
  InvalidTransition {
    transfer_id: Uuid,
    from:        TransferStatus,
    to:          TransferStatus,
  },
}

fn format_sizes(shortfalls: &[StockShortfall]) -> String {
  shortfalls
    .iter()
    .map(|s| s.size_class.to_string())
    .collect::<Vec<_>>()
    .join(", ")
}

impl Error {
  pub fn invalid_location(location_id: Uuid, reason: impl Into<String>) -> Self {
    Self::InvalidLocation { location_id, reason: reason.into() }
  }

  /// The size classes this error refers to, if any.
  pub fn failed_sizes(&self) -> Vec<SizeClass> {
    match self {
      Self::InsufficientStock(s) => s.iter().map(|s| s.size_class).collect(),
      _ => Vec::new(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lets callers that only see a backend's error type recover the domain
/// error it wraps, if any.
pub trait DomainError {
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}
