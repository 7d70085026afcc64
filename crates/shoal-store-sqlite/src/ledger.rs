//! Batch ledger reads and writes.
//!
//! Every write here runs inside a transaction opened by
//! [`SqliteStore`](crate::SqliteStore). Only production recording and the
//! transfer workflow call into the write half of this module.

use rusqlite::{Connection, OptionalExtension as _};
use shoal_core::{
  batch::{Batch, NewBatch, SizeClass, TransferProvenance},
  fifo::debit_batch,
  inventory::Stock,
  location::{StorageLocation, require_active},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    self, BATCH_COLUMNS, RawBatch, encode_dt, encode_provenance, encode_uuid,
  },
  registry,
};

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn get_batch(conn: &Connection, id: Uuid) -> Result<Option<Batch>> {
  let raw = conn
    .query_row(
      &format!("SELECT {BATCH_COLUMNS} FROM batches WHERE batch_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawBatch::from_row,
    )
    .optional()?;
  raw.map(RawBatch::into_batch).transpose()
}

/// Batches for one (location, size class), oldest first.
pub fn list_batches(
  conn: &Connection,
  location_id: Uuid,
  size_class: SizeClass,
) -> Result<Vec<Batch>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {BATCH_COLUMNS} FROM batches
     WHERE location_id = ?1 AND size_class = ?2
     ORDER BY created_at, seq"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![encode_uuid(location_id), size_class.get()],
      RawBatch::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawBatch::into_batch).collect()
}

/// Every batch that still holds stock, oldest first.
pub fn live_batches(conn: &Connection) -> Result<Vec<Batch>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {BATCH_COLUMNS} FROM batches
     WHERE pieces > 0 OR mass_grams > 0
     ORDER BY created_at, seq"
  ))?;
  let raws = stmt
    .query_map([], RawBatch::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawBatch::into_batch).collect()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

fn insert_batch(conn: &Connection, batch: &Batch) -> Result<()> {
  let (source_id, source_name, transfer_id) =
    encode_provenance(batch.provenance.as_ref());
  conn.execute(
    &format!(
      "INSERT INTO batches ({BATCH_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    ),
    rusqlite::params![
      encode_uuid(batch.batch_id),
      batch.source_batch_ref,
      encode_uuid(batch.location_id),
      batch.size_class.get(),
      batch.pieces,
      batch.mass_grams,
      encode_dt(batch.created_at),
      encode_dt(batch.processed_at),
      batch.farmer_name,
      source_id,
      source_name,
      transfer_id,
    ],
  )?;
  Ok(())
}

/// Record sorted production output. The location must exist and be active.
pub fn record_production(conn: &Connection, input: NewBatch) -> Result<Batch> {
  input.validate()?;
  let location = registry::get_location(conn, input.location_id)?;
  require_active(input.location_id, location.as_ref())?;

  let now = encode::now();
  let batch = Batch {
    batch_id:         Uuid::new_v4(),
    source_batch_ref: input.source_batch_ref,
    location_id:      input.location_id,
    size_class:       input.size_class,
    pieces:           input.pieces,
    mass_grams:       input.mass_grams,
    created_at:       input.produced_at.map(encode::stored_dt).unwrap_or(now),
    processed_at:     now,
    farmer_name:      input.farmer_name,
    provenance:       None,
  };
  insert_batch(conn, &batch)?;
  Ok(batch)
}

/// Labels carried over from the source batches a transfer drew on.
pub struct CreditOrigin {
  pub source_batch_ref: String,
  pub farmer_name:      Option<String>,
}

/// Create a new batch at the destination tagged with transfer provenance.
pub fn record_transfer_credit(
  conn: &Connection,
  destination_id: Uuid,
  size_class: SizeClass,
  amount: Stock,
  transfer_id: Uuid,
  source: &StorageLocation,
  origin: CreditOrigin,
) -> Result<Batch> {
  let now = encode::now();
  let batch = Batch {
    batch_id:         Uuid::new_v4(),
    source_batch_ref: origin.source_batch_ref,
    location_id:      destination_id,
    size_class,
    pieces:           amount.pieces,
    mass_grams:       amount.mass_grams,
    created_at:       now,
    processed_at:     now,
    farmer_name:      origin.farmer_name,
    provenance:       Some(TransferProvenance {
      source_location_id:   source.location_id,
      source_location_name: source.name.clone(),
      transfer_id,
    }),
  };
  insert_batch(conn, &batch)?;
  Ok(batch)
}

/// Reduce one batch in place. The batch keeps its creation timestamp and
/// stays in the ledger even when it reaches zero.
pub fn record_transfer_debit(
  conn: &Connection,
  batch_id: Uuid,
  amount: Stock,
) -> Result<Stock> {
  let batch = get_batch(conn, batch_id)?
    .ok_or(Error::Core(shoal_core::Error::BatchNotFound(batch_id)))?;

  let remaining = debit_batch(
    batch_id,
    Stock::new(batch.pieces, batch.mass_grams),
    amount,
  )
  .inspect_err(|e| {
    tracing::error!(
      batch_id = %batch_id,
      error = %e,
      "refusing to drive batch below zero"
    );
  })?;

  conn.execute(
    "UPDATE batches SET pieces = ?1, mass_grams = ?2 WHERE batch_id = ?3",
    rusqlite::params![remaining.pieces, remaining.mass_grams, encode_uuid(batch_id)],
  )?;
  Ok(remaining)
}
