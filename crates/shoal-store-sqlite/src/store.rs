//! [`SqliteStore`]: the SQLite implementation of [`InventoryStore`].

use std::{path::Path, time::Duration};

use rusqlite::TransactionBehavior;
use uuid::Uuid;

use shoal_core::{
  batch::{Batch, NewBatch, SizeClass},
  inventory::InventoryRow,
  location::{LocationStatus, NewLocation, StorageLocation},
  store::InventoryStore,
  transfer::{
    ApprovalOutcome, DeclineOutcome, NewTransferBatch, TransferFilter,
    TransferRequest,
  },
};

use crate::{Error, Result, encode, ledger, registry, schema::SCHEMA, workflow};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tuning for lock contention between writers.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How many times a transaction that hit a lock conflict is retried
  /// before [`ConcurrentModification`](shoal_core::Error::ConcurrentModification)
  /// is surfaced.
  pub max_retries:  u32,
  /// How long SQLite itself waits on a lock before reporting busy.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self { max_retries: 3, busy_timeout: Duration::from_millis(5_000) }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shoal inventory store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  options: StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, options: StoreOptions::default() };
    store.init_schema().await?;
    Ok(store)
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  async fn init_schema(&self) -> Result<()> {
    let busy_timeout = self.options.busy_timeout;
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `op` inside one transaction, committing only if it succeeds.
  ///
  /// Lock conflicts are retried up to `max_retries` times with a linear
  /// backoff, then reported as `ConcurrentModification`.
  async fn transact<T, F>(
    &self,
    behavior: TransactionBehavior,
    op_name: &'static str,
    op: F,
  ) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Clone + Send + 'static,
  {
    let mut attempt = 0;
    loop {
      let op = op.clone();
      let result = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction_with_behavior(behavior)?;
          match op(&tx) {
            Ok(value) => {
              tx.commit()?;
              Ok(Ok(value))
            }
            // Dropping `tx` rolls everything back.
            Err(e) => Ok(Err(e)),
          }
        })
        .await
        .map_err(Error::from)
        .and_then(|inner| inner);

      match result {
        Err(e) if e.is_busy() && attempt < self.options.max_retries => {
          attempt += 1;
          tracing::warn!(op = op_name, attempt, "lock conflict, retrying");
          tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
        }
        Err(e) if e.is_busy() => {
          tracing::warn!(op = op_name, attempt, "lock conflict, giving up");
          return Err(Error::Core(shoal_core::Error::ConcurrentModification));
        }
        other => return other,
      }
    }
  }

  async fn write<T, F>(&self, op_name: &'static str, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Clone + Send + 'static,
  {
    self.transact(TransactionBehavior::Immediate, op_name, op).await
  }

  async fn read<T, F>(&self, op_name: &'static str, op: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T> + Clone + Send + 'static,
  {
    self.transact(TransactionBehavior::Deferred, op_name, op).await
  }
}

// ─── InventoryStore impl ─────────────────────────────────────────────────────

impl InventoryStore for SqliteStore {
  type Error = Error;

  // ── Storage location registry ─────────────────────────────────────────────

  async fn add_location(&self, input: NewLocation) -> Result<StorageLocation> {
    input.validate()?;
    let location = StorageLocation {
      location_id:    Uuid::new_v4(),
      name:           input.name,
      kind:           input.kind,
      capacity_grams: input.capacity_grams,
      status:         LocationStatus::Active,
      created_at:     encode::now(),
    };

    let row = location.clone();
    self
      .write("add_location", move |conn| registry::insert_location(conn, &row))
      .await?;
    Ok(location)
  }

  async fn get_location(&self, id: Uuid) -> Result<Option<StorageLocation>> {
    self
      .read("get_location", move |conn| registry::get_location(conn, id))
      .await
  }

  async fn list_locations(&self, active_only: bool) -> Result<Vec<StorageLocation>> {
    self
      .read("list_locations", move |conn| {
        registry::list_locations(conn, active_only)
      })
      .await
  }

  async fn set_location_status(
    &self,
    id:     Uuid,
    status: LocationStatus,
  ) -> Result<StorageLocation> {
    let location = self
      .write("set_location_status", move |conn| {
        registry::set_status(conn, id, status)
      })
      .await?;
    tracing::info!(location_id = %id, %status, "location status changed");
    Ok(location)
  }

  // ── Batch ledger ──────────────────────────────────────────────────────────

  async fn record_production(&self, input: NewBatch) -> Result<Batch> {
    let batch = self
      .write("record_production", move |conn| {
        ledger::record_production(conn, input)
      })
      .await?;
    tracing::info!(
      batch_id = %batch.batch_id,
      location_id = %batch.location_id,
      size_class = %batch.size_class,
      pieces = batch.pieces,
      mass_grams = batch.mass_grams,
      "production recorded"
    );
    Ok(batch)
  }

  async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>> {
    self
      .read("get_batch", move |conn| ledger::get_batch(conn, id))
      .await
  }

  async fn list_batches(
    &self,
    location_id: Uuid,
    size_class:  SizeClass,
  ) -> Result<Vec<Batch>> {
    self
      .read("list_batches", move |conn| {
        registry::get_location(conn, location_id)?
          .ok_or(Error::Core(shoal_core::Error::LocationNotFound(location_id)))?;
        ledger::list_batches(conn, location_id, size_class)
      })
      .await
  }

  // ── Inventory aggregator ──────────────────────────────────────────────────

  async fn compute_inventory(&self) -> Result<Vec<InventoryRow>> {
    self
      .read("compute_inventory", workflow::compute_inventory)
      .await
  }

  // ── Transfer workflow ─────────────────────────────────────────────────────

  async fn create_transfer_batch(
    &self,
    input: NewTransferBatch,
  ) -> Result<Vec<TransferRequest>> {
    self
      .write("create_transfer_batch", move |conn| {
        workflow::create_transfer_batch(conn, input)
      })
      .await
  }

  async fn approve_transfer_batch(
    &self,
    transfer_id: Uuid,
    approver:    String,
  ) -> Result<ApprovalOutcome> {
    self
      .write("approve_transfer_batch", move |conn| {
        workflow::approve_transfer_batch(conn, transfer_id, &approver)
      })
      .await
  }

  async fn decline_transfer_batch(
    &self,
    transfer_id: Uuid,
    approver:    String,
  ) -> Result<DeclineOutcome> {
    self
      .write("decline_transfer_batch", move |conn| {
        workflow::decline_transfer_batch(conn, transfer_id, &approver)
      })
      .await
  }

  async fn get_transfer(&self, id: Uuid) -> Result<Option<TransferRequest>> {
    self
      .read("get_transfer", move |conn| workflow::get_transfer(conn, id))
      .await
  }

  async fn list_transfers(&self, filter: &TransferFilter) -> Result<Vec<TransferRequest>> {
    let filter = filter.clone();
    self
      .read("list_transfers", move |conn| {
        workflow::list_transfers(conn, &filter)
      })
      .await
  }

  async fn list_transfer_group(&self, group_id: Uuid) -> Result<Vec<TransferRequest>> {
    self
      .read("list_transfer_group", move |conn| {
        workflow::list_group(conn, group_id)
      })
      .await
  }
}
