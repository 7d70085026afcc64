//! The `InventoryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `shoal-store-sqlite`).
//! Higher layers (`shoal-api`, `shoal-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  DomainError,
  batch::{Batch, NewBatch, SizeClass},
  inventory::InventoryRow,
  location::{LocationStatus, NewLocation, StorageLocation},
  transfer::{
    ApprovalOutcome, DeclineOutcome, NewTransferBatch, TransferFilter,
    TransferRequest,
  },
};

/// Abstraction over a Shoal inventory backend.
///
/// Every mutating method runs as a single atomic transaction: either all of
/// its effects become visible or none do. Ledger writes happen only through
/// [`record_production`](Self::record_production) and the transfer
/// approval path.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait InventoryStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  // ── Storage location registry ─────────────────────────────────────────

  /// Register a new, active storage location.
  fn add_location(
    &self,
    input: NewLocation,
  ) -> impl Future<Output = Result<StorageLocation, Self::Error>> + Send + '_;

  /// Retrieve a location by id. Returns `None` if not found.
  fn get_location(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<StorageLocation>, Self::Error>> + Send + '_;

  /// List locations ordered by name, optionally only the active ones.
  fn list_locations(
    &self,
    active_only: bool,
  ) -> impl Future<Output = Result<Vec<StorageLocation>, Self::Error>> + Send + '_;

  /// Activate or deactivate a location. Locations are never deleted.
  fn set_location_status(
    &self,
    id: Uuid,
    status: LocationStatus,
  ) -> impl Future<Output = Result<StorageLocation, Self::Error>> + Send + '_;

  // ── Batch ledger ──────────────────────────────────────────────────────

  /// Record sorted production output at an active location.
  fn record_production(
    &self,
    input: NewBatch,
  ) -> impl Future<Output = Result<Batch, Self::Error>> + Send + '_;

  fn get_batch(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Batch>, Self::Error>> + Send + '_;

  /// All batches, including depleted ones, at a location and size class in
  /// FIFO order (oldest first). An unknown location is
  /// [`Error::LocationNotFound`](crate::Error::LocationNotFound).
  fn list_batches(
    &self,
    location_id: Uuid,
    size_class: SizeClass,
  ) -> impl Future<Output = Result<Vec<Batch>, Self::Error>> + Send + '_;

  // ── Inventory aggregator ──────────────────────────────────────────────

  /// Derive current stock per (location, size class) from the ledger.
  fn compute_inventory(
    &self,
  ) -> impl Future<Output = Result<Vec<InventoryRow>, Self::Error>> + Send + '_;

  // ── Transfer workflow ─────────────────────────────────────────────────

  /// Create one pending request per size class, all sharing a group id.
  /// All-or-nothing: any failing size class rejects the whole group.
  fn create_transfer_batch(
    &self,
    input: NewTransferBatch,
  ) -> impl Future<Output = Result<Vec<TransferRequest>, Self::Error>> + Send + '_;

  /// Approve and fulfil every still-pending member of the group containing
  /// `transfer_id`. Members that fail re-validation stay pending and are
  /// reported in the outcome.
  fn approve_transfer_batch(
    &self,
    transfer_id: Uuid,
    approver: String,
  ) -> impl Future<Output = Result<ApprovalOutcome, Self::Error>> + Send + '_;

  /// Decline every still-pending member of the group containing
  /// `transfer_id`. Never touches the ledger.
  fn decline_transfer_batch(
    &self,
    transfer_id: Uuid,
    approver: String,
  ) -> impl Future<Output = Result<DeclineOutcome, Self::Error>> + Send + '_;

  fn get_transfer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TransferRequest>, Self::Error>> + Send + '_;

  /// List transfer requests, newest first.
  fn list_transfers<'a>(
    &'a self,
    filter: &'a TransferFilter,
  ) -> impl Future<Output = Result<Vec<TransferRequest>, Self::Error>> + Send + 'a;

  /// Every member of a group, in size-class order.
  fn list_transfer_group(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TransferRequest>, Self::Error>> + Send + '_;
}
