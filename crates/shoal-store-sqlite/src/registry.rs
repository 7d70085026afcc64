//! Storage location registry queries.

use rusqlite::{Connection, OptionalExtension as _};
use shoal_core::location::{LocationStatus, StorageLocation};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{LOCATION_COLUMNS, RawLocation, encode_dt, encode_uuid},
};

pub fn insert_location(conn: &Connection, location: &StorageLocation) -> Result<()> {
  conn.execute(
    "INSERT INTO storage_locations (
       location_id, name, kind, capacity_grams, status, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(location.location_id),
      location.name,
      location.kind.to_string(),
      location.capacity_grams,
      location.status.to_string(),
      encode_dt(location.created_at),
    ],
  )?;
  Ok(())
}

pub fn get_location(conn: &Connection, id: Uuid) -> Result<Option<StorageLocation>> {
  let raw = conn
    .query_row(
      &format!("SELECT {LOCATION_COLUMNS} FROM storage_locations WHERE location_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawLocation::from_row,
    )
    .optional()?;
  raw.map(RawLocation::into_location).transpose()
}

pub fn list_locations(conn: &Connection, active_only: bool) -> Result<Vec<StorageLocation>> {
  let filter = if active_only { "WHERE status = 'active'" } else { "" };
  let mut stmt = conn.prepare(&format!(
    "SELECT {LOCATION_COLUMNS} FROM storage_locations {filter}
     ORDER BY name, location_id"
  ))?;
  let raws = stmt
    .query_map([], RawLocation::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawLocation::into_location).collect()
}

pub fn set_status(
  conn: &Connection,
  id: Uuid,
  status: LocationStatus,
) -> Result<StorageLocation> {
  let changed = conn.execute(
    "UPDATE storage_locations SET status = ?1 WHERE location_id = ?2",
    rusqlite::params![status.to_string(), encode_uuid(id)],
  )?;
  if changed == 0 {
    return Err(Error::Core(shoal_core::Error::LocationNotFound(id)));
  }
  get_location(conn, id)?
    .ok_or(Error::Core(shoal_core::Error::LocationNotFound(id)))
}
