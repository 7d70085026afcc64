//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! UUIDs are stored as hyphenated lowercase strings. Enums use their
//! snake_case names.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use shoal_core::{
  batch::{Batch, SizeClass, TransferProvenance},
  location::StorageLocation,
  transfer::TransferRequest,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Cut `dt` down to the microsecond precision [`encode_dt`] keeps, so a value
/// returned from a write equals the one a later read decodes.
pub fn stored_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// The current time at stored precision.
pub fn now() -> DateTime<Utc> { stored_dt(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse a strum-backed enum column.
pub fn decode_enum<T: FromStr>(column: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {column}: {s:?}")))
}

pub fn decode_size_class(n: i64) -> Result<SizeClass> {
  u8::try_from(n)
    .ok()
    .and_then(|n| SizeClass::new(n).ok())
    .ok_or_else(|| Error::Decode(format!("size class out of range: {n}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const LOCATION_COLUMNS: &str =
  "location_id, name, kind, capacity_grams, status, created_at";

/// Raw values read directly from a `storage_locations` row.
pub struct RawLocation {
  pub location_id:    String,
  pub name:           String,
  pub kind:           String,
  pub capacity_grams: i64,
  pub status:         String,
  pub created_at:     String,
}

impl RawLocation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      location_id:    row.get(0)?,
      name:           row.get(1)?,
      kind:           row.get(2)?,
      capacity_grams: row.get(3)?,
      status:         row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_location(self) -> Result<StorageLocation> {
    Ok(StorageLocation {
      location_id:    decode_uuid(&self.location_id)?,
      name:           self.name,
      kind:           decode_enum("location kind", &self.kind)?,
      capacity_grams: self.capacity_grams,
      status:         decode_enum("location status", &self.status)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

pub const BATCH_COLUMNS: &str = "batch_id, source_batch_ref, location_id, \
  size_class, pieces, mass_grams, created_at, processed_at, farmer_name, \
  source_location_id, source_location_name, transfer_id";

/// Raw values read directly from a `batches` row.
pub struct RawBatch {
  pub batch_id:             String,
  pub source_batch_ref:     String,
  pub location_id:          String,
  pub size_class:           i64,
  pub pieces:               i64,
  pub mass_grams:           i64,
  pub created_at:           String,
  pub processed_at:         String,
  pub farmer_name:          Option<String>,
  // provenance, all set or all null
  pub source_location_id:   Option<String>,
  pub source_location_name: Option<String>,
  pub transfer_id:          Option<String>,
}

impl RawBatch {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      batch_id:             row.get(0)?,
      source_batch_ref:     row.get(1)?,
      location_id:          row.get(2)?,
      size_class:           row.get(3)?,
      pieces:               row.get(4)?,
      mass_grams:           row.get(5)?,
      created_at:           row.get(6)?,
      processed_at:         row.get(7)?,
      farmer_name:          row.get(8)?,
      source_location_id:   row.get(9)?,
      source_location_name: row.get(10)?,
      transfer_id:          row.get(11)?,
    })
  }

  pub fn into_batch(self) -> Result<Batch> {
    let provenance = match (
      self.source_location_id,
      self.source_location_name,
      self.transfer_id,
    ) {
      (Some(id), Some(name), Some(transfer)) => Some(TransferProvenance {
        source_location_id:   decode_uuid(&id)?,
        source_location_name: name,
        transfer_id:          decode_uuid(&transfer)?,
      }),
      _ => None,
    };

    Ok(Batch {
      batch_id: decode_uuid(&self.batch_id)?,
      source_batch_ref: self.source_batch_ref,
      location_id: decode_uuid(&self.location_id)?,
      size_class: decode_size_class(self.size_class)?,
      pieces: self.pieces,
      mass_grams: self.mass_grams,
      created_at: decode_dt(&self.created_at)?,
      processed_at: decode_dt(&self.processed_at)?,
      farmer_name: self.farmer_name,
      provenance,
    })
  }
}

pub const TRANSFER_COLUMNS: &str = "transfer_id, group_id, \
  source_location_id, destination_location_id, size_class, requested_pieces, \
  requested_mass_grams, moved_mass_grams, status, requested_by, approved_by, \
  created_at, approved_at, completed_at, declined_at, notes";

/// Raw values read directly from a `transfer_requests` row.
pub struct RawTransfer {
  pub transfer_id:             String,
  pub group_id:                String,
  pub source_location_id:      String,
  pub destination_location_id: String,
  pub size_class:              i64,
  pub requested_pieces:        i64,
  pub requested_mass_grams:    i64,
  pub moved_mass_grams:        Option<i64>,
  pub status:                  String,
  pub requested_by:            String,
  pub approved_by:             Option<String>,
  pub created_at:              String,
  pub approved_at:             Option<String>,
  pub completed_at:            Option<String>,
  pub declined_at:             Option<String>,
  pub notes:                   Option<String>,
}

impl RawTransfer {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transfer_id:             row.get(0)?,
      group_id:                row.get(1)?,
      source_location_id:      row.get(2)?,
      destination_location_id: row.get(3)?,
      size_class:              row.get(4)?,
      requested_pieces:        row.get(5)?,
      requested_mass_grams:    row.get(6)?,
      moved_mass_grams:        row.get(7)?,
      status:                  row.get(8)?,
      requested_by:            row.get(9)?,
      approved_by:             row.get(10)?,
      created_at:              row.get(11)?,
      approved_at:             row.get(12)?,
      completed_at:            row.get(13)?,
      declined_at:             row.get(14)?,
      notes:                   row.get(15)?,
    })
  }

  pub fn into_transfer(self) -> Result<TransferRequest> {
    Ok(TransferRequest {
      transfer_id:             decode_uuid(&self.transfer_id)?,
      group_id:                decode_uuid(&self.group_id)?,
      source_location_id:      decode_uuid(&self.source_location_id)?,
      destination_location_id: decode_uuid(&self.destination_location_id)?,
      size_class:              decode_size_class(self.size_class)?,
      requested_pieces:        self.requested_pieces,
      requested_mass_grams:    self.requested_mass_grams,
      moved_mass_grams:        self.moved_mass_grams,
      status:                  decode_enum("transfer status", &self.status)?,
      requested_by:            self.requested_by,
      approved_by:             self.approved_by,
      created_at:              decode_dt(&self.created_at)?,
      approved_at:             decode_opt_dt(self.approved_at)?,
      completed_at:            decode_opt_dt(self.completed_at)?,
      declined_at:             decode_opt_dt(self.declined_at)?,
      notes:                   self.notes,
    })
  }
}

/// Provenance columns of a batch, ready for binding.
pub fn encode_provenance(
  p: Option<&TransferProvenance>,
) -> (Option<String>, Option<String>, Option<String>) {
  match p {
    Some(p) => (
      Some(encode_uuid(p.source_location_id)),
      Some(p.source_location_name.clone()),
      Some(encode_uuid(p.transfer_id)),
    ),
    None => (None, None, None),
  }
}
