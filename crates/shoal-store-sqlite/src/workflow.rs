//! Transfer workflow: grouped creation, approval with FIFO fulfilment, and
//! decline.
//!
//! Each public function expects to run inside a single `BEGIN IMMEDIATE`
//! transaction, which serialises it against every other writer on the
//! database. Availability is always re-read inside that transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use shoal_core::{
  fifo::plan_depletion,
  inventory::{InventoryRow, Snapshot, aggregate},
  location::StorageLocation,
  transfer::{
    ApprovalOutcome, DeclineOutcome, FailureReason, MemberFailure,
    NewTransferBatch, TransferFilter, TransferRequest, TransferStatus,
    check_member, validate_new_transfer,
  },
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{self, RawTransfer, TRANSFER_COLUMNS, encode_dt, encode_uuid},
  ledger::{self, CreditOrigin},
  registry,
};

// ─── Inventory ───────────────────────────────────────────────────────────────

pub fn compute_inventory(conn: &Connection) -> Result<Vec<InventoryRow>> {
  let locations = registry::list_locations(conn, false)?;
  let batches = ledger::live_batches(conn)?;
  Ok(aggregate(&locations, &batches)?)
}

fn snapshot(conn: &Connection) -> Result<Snapshot> {
  Ok(Snapshot::from_rows(&compute_inventory(conn)?))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn get_transfer(conn: &Connection, id: Uuid) -> Result<Option<TransferRequest>> {
  let raw = conn
    .query_row(
      &format!("SELECT {TRANSFER_COLUMNS} FROM transfer_requests WHERE transfer_id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawTransfer::from_row,
    )
    .optional()?;
  raw.map(RawTransfer::into_transfer).transpose()
}

pub fn list_group(conn: &Connection, group_id: Uuid) -> Result<Vec<TransferRequest>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TRANSFER_COLUMNS} FROM transfer_requests
     WHERE group_id = ?1
     ORDER BY size_class"
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(group_id)], RawTransfer::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTransfer::into_transfer).collect()
}

pub fn list_transfers(
  conn: &Connection,
  filter: &TransferFilter,
) -> Result<Vec<TransferRequest>> {
  let status = filter.status.map(|s| s.to_string());
  let location = filter.location_id.map(encode_uuid);

  let mut stmt = conn.prepare(&format!(
    "SELECT {TRANSFER_COLUMNS} FROM transfer_requests
     WHERE (?1 IS NULL OR status = ?1)
       AND (?2 IS NULL OR source_location_id = ?2 OR destination_location_id = ?2)
     ORDER BY created_at DESC, group_id, size_class"
  ))?;
  let raws = stmt
    .query_map(
      rusqlite::params![status.as_deref(), location.as_deref()],
      RawTransfer::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTransfer::into_transfer).collect()
}

/// The anchor request and its group's still-pending members.
fn pending_group(
  conn: &Connection,
  transfer_id: Uuid,
) -> Result<(TransferRequest, Vec<TransferRequest>)> {
  let anchor = get_transfer(conn, transfer_id)?
    .ok_or(Error::Core(shoal_core::Error::TransferNotFound(transfer_id)))?;
  let pending = list_group(conn, anchor.group_id)?
    .into_iter()
    .filter(|t| t.status == TransferStatus::Pending)
    .collect();
  Ok((anchor, pending))
}

// ─── Create ──────────────────────────────────────────────────────────────────

fn insert_transfer(conn: &Connection, t: &TransferRequest) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO transfer_requests ({TRANSFER_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    ),
    rusqlite::params![
      encode_uuid(t.transfer_id),
      encode_uuid(t.group_id),
      encode_uuid(t.source_location_id),
      encode_uuid(t.destination_location_id),
      t.size_class.get(),
      t.requested_pieces,
      t.requested_mass_grams,
      t.moved_mass_grams,
      t.status.to_string(),
      t.requested_by,
      t.approved_by,
      encode_dt(t.created_at),
      t.approved_at.map(encode_dt),
      t.completed_at.map(encode_dt),
      t.declined_at.map(encode_dt),
      t.notes,
    ],
  )?;
  Ok(())
}

/// Validate the whole group against current stock, then insert one pending
/// row per size class. Nothing is written if any size class fails.
pub fn create_transfer_batch(
  conn: &Connection,
  input: NewTransferBatch,
) -> Result<Vec<TransferRequest>> {
  let source = registry::get_location(conn, input.source_location_id)?;
  let destination = registry::get_location(conn, input.destination_location_id)?;
  let snapshot = snapshot(conn)?;

  validate_new_transfer(&input, source.as_ref(), destination.as_ref(), &snapshot)?;

  let group_id = Uuid::new_v4();
  let created_at = encode::now();
  let mut created = Vec::with_capacity(input.sizes.len());

  for (&size_class, requested) in &input.sizes {
    let request = TransferRequest {
      transfer_id: Uuid::new_v4(),
      group_id,
      source_location_id: input.source_location_id,
      destination_location_id: input.destination_location_id,
      size_class,
      requested_pieces: requested.pieces,
      requested_mass_grams: requested.mass_grams,
      moved_mass_grams: None,
      status: TransferStatus::Pending,
      requested_by: input.requested_by.clone(),
      approved_by: None,
      created_at,
      approved_at: None,
      completed_at: None,
      declined_at: None,
      notes: input.notes.clone(),
    };
    insert_transfer(conn, &request)?;
    created.push(request);
  }

  tracing::info!(
    group_id = %group_id,
    source = %input.source_location_id,
    destination = %input.destination_location_id,
    sizes = created.len(),
    "transfer group created"
  );
  Ok(created)
}

// ─── Status transitions ──────────────────────────────────────────────────────

/// Move a request from `from` to `to`, stamping the matching timestamp.
/// The `status = from` guard turns a lost race into
/// [`ConcurrentModification`](shoal_core::Error::ConcurrentModification).
fn transition(
  conn: &Connection,
  request: &mut TransferRequest,
  to: TransferStatus,
  actor: &str,
  at: DateTime<Utc>,
) -> Result<()> {
  let from = request.status;
  let column = match to {
    TransferStatus::Approved => Some("approved_at"),
    TransferStatus::Completed => Some("completed_at"),
    TransferStatus::Declined => Some("declined_at"),
    TransferStatus::Pending => None,
  };
  let column = column.filter(|_| from.can_transition_to(to)).ok_or(
    shoal_core::Error::InvalidTransition {
      transfer_id: request.transfer_id,
      from,
      to,
    },
  )?;
  let changed = conn.execute(
    &format!(
      "UPDATE transfer_requests
       SET status = ?1, approved_by = ?2, {column} = ?3, moved_mass_grams = ?4
       WHERE transfer_id = ?5 AND status = ?6"
    ),
    rusqlite::params![
      to.to_string(),
      actor,
      encode_dt(at),
      request.moved_mass_grams,
      encode_uuid(request.transfer_id),
      from.to_string(),
    ],
  )?;
  if changed == 0 {
    return Err(Error::Core(shoal_core::Error::ConcurrentModification));
  }

  request.status = to;
  request.approved_by = Some(actor.to_owned());
  match to {
    TransferStatus::Approved => request.approved_at = Some(at),
    TransferStatus::Completed => request.completed_at = Some(at),
    TransferStatus::Declined => request.declined_at = Some(at),
    TransferStatus::Pending => {}
  }
  Ok(())
}

// ─── Approve ─────────────────────────────────────────────────────────────────

fn join_distinct<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
  let set: BTreeSet<&str> = values.filter(|v| !v.is_empty()).collect();
  (!set.is_empty()).then(|| set.into_iter().collect::<Vec<_>>().join(", "))
}

/// Approve and fulfil every pending member of `transfer_id`'s group.
///
/// Members are handled in size-class order. Each one is re-validated against
/// the current stock; survivors are depleted FIFO at the source, credited at
/// the destination and taken straight through `approved` to `completed`.
pub fn approve_transfer_batch(
  conn: &Connection,
  transfer_id: Uuid,
  approver: &str,
) -> Result<ApprovalOutcome> {
  let (anchor, members) = pending_group(conn, transfer_id)?;
  let source = existing_location(conn, anchor.source_location_id)?;
  let destination = existing_location(conn, anchor.destination_location_id)?;
  let mut snapshot = snapshot(conn)?;

  let mut outcome = ApprovalOutcome {
    group_id: anchor.group_id,
    approved: Vec::new(),
    failed:   Vec::new(),
  };

  for mut member in members {
    if let Err(reason) =
      check_member(&member, Some(&source), Some(&destination), &snapshot)
    {
      tracing::warn!(
        transfer_id = %member.transfer_id,
        size_class = %member.size_class,
        ?reason,
        "transfer member failed re-validation"
      );
      outcome.failed.push(fail(&member, reason));
      continue;
    }

    let batches = ledger::list_batches(conn, source.location_id, member.size_class)?;
    let plan = plan_depletion(&batches, member.requested_pieces)?;

    let available_grams = snapshot.available_capacity(destination.location_id);
    if plan.total.mass_grams > available_grams {
      let reason = FailureReason::InsufficientCapacity {
        required_grams: plan.total.mass_grams,
        available_grams,
      };
      tracing::warn!(transfer_id = %member.transfer_id, ?reason, "transfer member failed re-validation");
      outcome.failed.push(fail(&member, reason));
      continue;
    }

    let origin = {
      let drawn: Vec<_> = plan
        .debits
        .iter()
        .filter_map(|d| batches.iter().find(|b| b.batch_id == d.batch_id))
        .collect();
      CreditOrigin {
        source_batch_ref: join_distinct(drawn.iter().map(|b| b.source_batch_ref.as_str()))
          .unwrap_or_default(),
        farmer_name:      join_distinct(drawn.iter().filter_map(|b| b.farmer_name.as_deref())),
      }
    };

    for debit in &plan.debits {
      ledger::record_transfer_debit(conn, debit.batch_id, debit.amount)?;
    }
    ledger::record_transfer_credit(
      conn,
      destination.location_id,
      member.size_class,
      plan.total,
      member.transfer_id,
      &source,
      origin,
    )?;

    let now = encode::now();
    member.moved_mass_grams = Some(plan.total.mass_grams);
    transition(conn, &mut member, TransferStatus::Approved, approver, now)?;
    transition(conn, &mut member, TransferStatus::Completed, approver, now)?;

    snapshot.apply_move(
      source.location_id,
      destination.location_id,
      member.size_class,
      plan.total,
    )?;
    outcome.approved.push(member);
  }

  tracing::info!(
    group_id = %outcome.group_id,
    approver,
    approved = outcome.approved_count(),
    failed = outcome.failed.len(),
    "transfer group approved"
  );
  Ok(outcome)
}

fn existing_location(conn: &Connection, id: Uuid) -> Result<StorageLocation> {
  registry::get_location(conn, id)?.ok_or(Error::Core(
    shoal_core::Error::invalid_location(id, "location does not exist"),
  ))
}

fn fail(member: &TransferRequest, reason: FailureReason) -> MemberFailure {
  MemberFailure {
    transfer_id: member.transfer_id,
    size_class: member.size_class,
    reason,
  }
}

// ─── Decline ─────────────────────────────────────────────────────────────────

/// Decline every pending member of `transfer_id`'s group. Status only; the
/// ledger is not touched.
pub fn decline_transfer_batch(
  conn: &Connection,
  transfer_id: Uuid,
  approver: &str,
) -> Result<DeclineOutcome> {
  let (anchor, members) = pending_group(conn, transfer_id)?;
  let now = encode::now();

  let mut declined = Vec::with_capacity(members.len());
  for mut member in members {
    transition(conn, &mut member, TransferStatus::Declined, approver, now)?;
    declined.push(member);
  }

  tracing::info!(
    group_id = %anchor.group_id,
    approver,
    declined = declined.len(),
    "transfer group declined"
  );
  Ok(DeclineOutcome { group_id: anchor.group_id, declined })
}
