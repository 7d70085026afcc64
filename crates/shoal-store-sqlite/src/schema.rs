//! SQL schema for the Shoal SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- No usage column: usage is always derived from batches.
CREATE TABLE IF NOT EXISTS storage_locations (
    location_id     TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- 'cold_storage' | 'freezer' | 'processing_area' | 'other'
    capacity_grams  INTEGER NOT NULL CHECK (capacity_grams >= 0),
    status          TEXT NOT NULL DEFAULT 'active',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transfer_requests (
    transfer_id             TEXT PRIMARY KEY,
    group_id                TEXT NOT NULL,
    source_location_id      TEXT NOT NULL REFERENCES storage_locations(location_id),
    destination_location_id TEXT NOT NULL REFERENCES storage_locations(location_id),
    size_class              INTEGER NOT NULL CHECK (size_class BETWEEN 0 AND 10),
    requested_pieces        INTEGER NOT NULL CHECK (requested_pieces > 0),
    requested_mass_grams    INTEGER NOT NULL CHECK (requested_mass_grams > 0),
    moved_mass_grams        INTEGER,
    status                  TEXT NOT NULL DEFAULT 'pending',
    requested_by            TEXT NOT NULL,
    approved_by             TEXT,
    created_at              TEXT NOT NULL,
    approved_at             TEXT,
    completed_at            TEXT,
    declined_at             TEXT,
    notes                   TEXT,
    CHECK (source_location_id != destination_location_id),
    UNIQUE (group_id, size_class)
);

-- Batches are never deleted. Depletion only ever lowers pieces/mass, and
-- the CHECKs below reject any write that would take them negative.
-- `seq` breaks ties between equal creation timestamps in FIFO order.
CREATE TABLE IF NOT EXISTS batches (
    seq                  INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id             TEXT NOT NULL UNIQUE,
    source_batch_ref     TEXT NOT NULL,
    location_id          TEXT NOT NULL REFERENCES storage_locations(location_id),
    size_class           INTEGER NOT NULL CHECK (size_class BETWEEN 0 AND 10),
    pieces               INTEGER NOT NULL CHECK (pieces >= 0),
    mass_grams           INTEGER NOT NULL CHECK (mass_grams >= 0),
    created_at           TEXT NOT NULL,   -- fixed-width RFC 3339 UTC; FIFO key
    processed_at         TEXT NOT NULL,
    farmer_name          TEXT,
    source_location_id   TEXT REFERENCES storage_locations(location_id),
    source_location_name TEXT,
    transfer_id          TEXT REFERENCES transfer_requests(transfer_id)
);

CREATE INDEX IF NOT EXISTS batches_fifo_idx      ON batches(location_id, size_class, created_at, seq);
CREATE INDEX IF NOT EXISTS transfers_group_idx   ON transfer_requests(group_id);
CREATE INDEX IF NOT EXISTS transfers_status_idx  ON transfer_requests(status);

PRAGMA user_version = 1;
";
