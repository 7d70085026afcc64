//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use shoal_core::{
  batch::{Batch, MAX_MASS_GRAMS, NewBatch, SizeClass},
  inventory::{InventoryRow, Stock},
  location::{LocationKind, LocationStatus, NewLocation, StorageLocation},
  store::InventoryStore,
  transfer::{FailureReason, NewTransferBatch, TransferFilter, TransferStatus},
};
use uuid::Uuid;

use crate::{Error, SqliteStore, ledger};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap() }

fn size(n: u8) -> SizeClass { SizeClass::new(n).unwrap() }

async fn location(s: &SqliteStore, name: &str, capacity_grams: i64) -> StorageLocation {
  s.add_location(NewLocation {
    name: name.into(),
    kind: LocationKind::ColdStorage,
    capacity_grams,
  })
  .await
  .unwrap()
}

async fn produce(
  s: &SqliteStore,
  loc: &StorageLocation,
  size_class: u8,
  pieces: i64,
  mass_grams: i64,
  at: DateTime<Utc>,
) -> Batch {
  let mut input =
    NewBatch::new(loc.location_id, size(size_class), pieces, mass_grams, "SORT-7");
  input.produced_at = Some(at);
  input.farmer_name = Some("Tran Van An".into());
  s.record_production(input).await.unwrap()
}

fn transfer(
  from: &StorageLocation,
  to: &StorageLocation,
  sizes: &[(u8, i64, i64)],
) -> NewTransferBatch {
  NewTransferBatch {
    source_location_id:      from.location_id,
    destination_location_id: to.location_id,
    sizes:                   sizes
      .iter()
      .map(|&(s, p, m)| (size(s), Stock::new(p, m)))
      .collect(),
    requested_by:            "clerk-1".into(),
    notes:                   Some("weekly rebalance".into()),
  }
}

fn row<'a>(
  rows: &'a [InventoryRow],
  loc: &StorageLocation,
  size_class: u8,
) -> Option<&'a InventoryRow> {
  rows.iter().find(|r| {
    r.location_id == loc.location_id && r.size_class == Some(size(size_class))
  })
}

fn core_err(err: &Error) -> &shoal_core::Error {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_location() {
  let s = store().await;
  let loc = location(&s, "Cold A", 100_000).await;
  assert_eq!(loc.status, LocationStatus::Active);

  let fetched = s.get_location(loc.location_id).await.unwrap().unwrap();
  assert_eq!(fetched, loc);
}

#[tokio::test]
async fn get_location_missing_returns_none() {
  let s = store().await;
  assert!(s.get_location(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn list_locations_filters_inactive() {
  let s = store().await;
  let a = location(&s, "Cold A", 1).await;
  let b = location(&s, "Freezer B", 1).await;
  s.set_location_status(b.location_id, LocationStatus::Inactive)
    .await
    .unwrap();

  let all = s.list_locations(false).await.unwrap();
  assert_eq!(all.len(), 2);
  let active = s.list_locations(true).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].location_id, a.location_id);
}

#[tokio::test]
async fn set_status_unknown_location_errors() {
  let s = store().await;
  let err = s
    .set_location_status(Uuid::new_v4(), LocationStatus::Inactive)
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::LocationNotFound(_)));
}

#[tokio::test]
async fn add_location_rejects_negative_capacity() {
  let s = store().await;
  let err = s
    .add_location(NewLocation {
      name:           "Bad".into(),
      kind:           LocationKind::Other,
      capacity_grams: -5,
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidQuantity(_)));
}

// ─── Production ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn production_at_unknown_location_is_invalid() {
  let s = store().await;
  let err = s
    .record_production(NewBatch::new(Uuid::new_v4(), size(1), 10, 1_000, "S"))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidLocation { .. }));
}

#[tokio::test]
async fn production_at_inactive_location_is_invalid() {
  let s = store().await;
  let loc = location(&s, "Cold A", 1_000).await;
  s.set_location_status(loc.location_id, LocationStatus::Inactive)
    .await
    .unwrap();
  let err = s
    .record_production(NewBatch::new(loc.location_id, size(1), 10, 1_000, "S"))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidLocation { .. }));
}

#[tokio::test]
async fn production_with_zero_quantity_is_invalid() {
  let s = store().await;
  let loc = location(&s, "Cold A", 1_000).await;
  let err = s
    .record_production(NewBatch::new(loc.location_id, size(1), 0, 1_000, "S"))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidQuantity(_)));
}

#[tokio::test]
async fn production_roundtrips_through_the_ledger() {
  let s = store().await;
  let loc = location(&s, "Cold A", 1_000_000).await;
  let batch = produce(&s, &loc, 4, 12, 6_000, t0()).await;

  let fetched = s.get_batch(batch.batch_id).await.unwrap().unwrap();
  assert_eq!(fetched.created_at, t0());
  assert_eq!(fetched.pieces, 12);
  assert_eq!(fetched.mass_grams, 6_000);
  assert_eq!(fetched.farmer_name.as_deref(), Some("Tran Van An"));
  assert!(fetched.provenance.is_none());
}

#[tokio::test]
async fn list_batches_is_fifo_ordered() {
  let s = store().await;
  let loc = location(&s, "Cold A", 1_000_000).await;
  let late = produce(&s, &loc, 2, 1, 10, t0() + Duration::hours(5)).await;
  let early = produce(&s, &loc, 2, 1, 10, t0()).await;
  let mid = produce(&s, &loc, 2, 1, 10, t0() + Duration::hours(1)).await;
  produce(&s, &loc, 3, 1, 10, t0()).await;

  let ids: Vec<_> = s
    .list_batches(loc.location_id, size(2))
    .await
    .unwrap()
    .into_iter()
    .map(|b| b.batch_id)
    .collect();
  assert_eq!(ids, vec![early.batch_id, mid.batch_id, late.batch_id]);
}

#[tokio::test]
async fn returned_batch_matches_stored_batch() {
  let s = store().await;
  let loc = location(&s, "Cold A", 1_000_000).await;
  assert_eq!(s.get_location(loc.location_id).await.unwrap().unwrap(), loc);

  let batch = s
    .record_production(NewBatch::new(loc.location_id, size(1), 3, 900, "SORT-8"))
    .await
    .unwrap();
  let fetched = s.get_batch(batch.batch_id).await.unwrap().unwrap();
  assert_eq!(fetched, batch);
  assert_eq!(batch.created_at, batch.processed_at);

  let mut input = NewBatch::new(loc.location_id, size(1), 3, 900, "SORT-8");
  input.produced_at = Some(t0() + Duration::nanoseconds(1_234_567));
  let batch = s.record_production(input).await.unwrap();
  assert_eq!(batch.created_at, t0() + Duration::microseconds(1_234));
  assert_eq!(s.get_batch(batch.batch_id).await.unwrap().unwrap(), batch);
}

#[tokio::test]
async fn list_batches_at_unknown_location_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s.list_batches(missing, size(1)).await.unwrap_err();
  assert!(matches!(
    core_err(&err),
    shoal_core::Error::LocationNotFound(id) if *id == missing
  ));

  let loc = location(&s, "Cold A", 1_000).await;
  assert!(s.list_batches(loc.location_id, size(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_amounts_are_rejected_and_store_stays_usable() {
  let s = store().await;
  let loc = location(&s, "Cold A", MAX_MASS_GRAMS).await;
  let half = i64::MAX / 2 + 1;
  for n in [1, 2] {
    let err = s
      .record_production(NewBatch::new(loc.location_id, size(n), 1, half, "S"))
      .await
      .unwrap_err();
    assert!(matches!(core_err(&err), shoal_core::Error::InvalidQuantity(_)));
  }

  let err = s
    .add_location(NewLocation {
      name:           "Silo".into(),
      kind:           LocationKind::ColdStorage,
      capacity_grams: half,
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidQuantity(_)));

  produce(&s, &loc, 1, 1, MAX_MASS_GRAMS, t0()).await;
  produce(&s, &loc, 2, 1, MAX_MASS_GRAMS, t0()).await;

  let rows = s.compute_inventory().await.unwrap();
  let size1 = row(&rows, &loc, 1).unwrap();
  assert_eq!(size1.usage_grams, 2 * MAX_MASS_GRAMS);
  assert_eq!(size1.utilization_percent, 200.0);
  assert_eq!(size1.available_capacity_grams, 0);
  assert_eq!(s.list_locations(false).await.unwrap().len(), 1);
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_location_is_still_listed() {
  let s = store().await;
  let loc = location(&s, "Empty", 5_000).await;
  let rows = s.compute_inventory().await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].location_id, loc.location_id);
  assert_eq!(rows[0].size_class, None);
  assert_eq!(rows[0].total_pieces, 0);
  assert_eq!(rows[0].utilization_percent, 0.0);
}

#[tokio::test]
async fn compute_inventory_is_idempotent() {
  let s = store().await;
  let loc = location(&s, "Cold A", 100_000).await;
  produce(&s, &loc, 1, 10, 1_000, t0()).await;
  produce(&s, &loc, 2, 5, 2_500, t0()).await;

  let first = s.compute_inventory().await.unwrap();
  let second = s.compute_inventory().await.unwrap();
  assert_eq!(first, second);
  assert_eq!(first[0].usage_grams, 3_500);
  assert_eq!(first[0].utilization_percent, 3.5);
}

// ─── Transfer creation ───────────────────────────────────────────────────────

#[tokio::test]
async fn overdrawn_request_is_rejected_and_nothing_is_created() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 3, 100, 50_000, t0()).await;

  let err = s
    .create_transfer_batch(transfer(&a, &b, &[(3, 150, 50_000)]))
    .await
    .unwrap_err();
  let shoal_core::Error::InsufficientStock(shortfalls) = core_err(&err) else {
    panic!("expected InsufficientStock, got {err:?}");
  };
  assert_eq!(shortfalls[0].size_class, size(3));
  assert_eq!(shortfalls[0].available.pieces, 100);

  let all = s.list_transfers(&TransferFilter::default()).await.unwrap();
  assert!(all.is_empty());
}

#[tokio::test]
async fn creation_is_all_or_nothing() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 1, 50, 5_000, t0()).await;
  produce(&s, &a, 2, 5, 500, t0()).await;

  let err = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 10, 1_000), (2, 6, 600)]))
    .await
    .unwrap_err();
  assert_eq!(core_err(&err).failed_sizes(), vec![size(2)]);

  let all = s.list_transfers(&TransferFilter::default()).await.unwrap();
  assert!(all.is_empty());
}

#[tokio::test]
async fn group_members_share_correlation_fields() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  for n in [1, 2, 4] {
    produce(&s, &a, n, 10, 1_000, t0()).await;
  }

  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 1, 100), (2, 2, 200), (4, 3, 300)]))
    .await
    .unwrap();
  assert_eq!(created.len(), 3);
  let first = &created[0];
  assert!(created.iter().all(|t| {
    t.group_id == first.group_id
      && t.created_at == first.created_at
      && t.notes == first.notes
      && t.source_location_id == a.location_id
      && t.destination_location_id == b.location_id
      && t.status == TransferStatus::Pending
  }));

  let group = s.list_transfer_group(first.group_id).await.unwrap();
  assert_eq!(group.len(), 3);
}

#[tokio::test]
async fn same_source_and_destination_is_rejected() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;
  let err = s
    .create_transfer_batch(transfer(&a, &a, &[(1, 1, 100)]))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::SameLocation(_)));
}

#[tokio::test]
async fn inactive_destination_is_rejected() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;
  s.set_location_status(b.location_id, LocationStatus::Inactive)
    .await
    .unwrap();
  let err = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 1, 100)]))
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::InvalidLocation { location_id, .. } if *location_id == b.location_id));
}

#[tokio::test]
async fn destination_capacity_is_checked_at_creation() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Small", 10_000).await;
  produce(&s, &a, 1, 100, 50_000, t0()).await;
  let err = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 40, 20_000)]))
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(&err),
    shoal_core::Error::InsufficientCapacity { required_grams: 20_000, available_grams: 10_000, .. }
  ));
}

// ─── Approval ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn approve_scenario_cold_a_to_cold_b() {
  let s = store().await;
  let a = location(&s, "Cold A", 100_000).await;
  let b = location(&s, "Cold B", 200_000).await;
  let original = produce(&s, &a, 3, 100, 50_000, t0()).await;

  let before = s.compute_inventory().await.unwrap();
  assert_eq!(row(&before, &a, 3).unwrap().utilization_percent, 50.0);

  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(3, 40, 20_000)]))
    .await
    .unwrap();
  let transfer_id = created[0].transfer_id;

  let outcome = s
    .approve_transfer_batch(transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(outcome.approved_count(), 1);
  assert!(outcome.failed.is_empty());

  let rows = s.compute_inventory().await.unwrap();

  let at_a = row(&rows, &a, 3).unwrap();
  assert_eq!(at_a.total_pieces, 60);
  assert_eq!(at_a.total_mass_grams, 30_000);
  assert_eq!(at_a.batch_count, 1);
  assert_eq!(at_a.batches[0].batch_id, original.batch_id);
  assert_eq!(at_a.batches[0].created_at, t0());
  assert_eq!(at_a.utilization_percent, 30.0);
  assert_eq!(at_a.available_capacity_grams, 70_000);

  let at_b = row(&rows, &b, 3).unwrap();
  assert_eq!(at_b.total_pieces, 40);
  assert_eq!(at_b.total_mass_grams, 20_000);
  assert_eq!(at_b.batch_count, 1);
  assert_eq!(at_b.batches[0].source_location_name.as_deref(), Some("Cold A"));
  assert_eq!(at_b.batches[0].transfer_id, Some(transfer_id));
  assert_eq!(at_b.batches[0].source_batch_ref, "SORT-7");
  assert_eq!(at_b.batches[0].farmer_name.as_deref(), Some("Tran Van An"));
  assert_eq!(at_b.utilization_percent, 10.0);

  let done = s.get_transfer(transfer_id).await.unwrap().unwrap();
  assert_eq!(done.status, TransferStatus::Completed);
  assert_eq!(done.approved_by.as_deref(), Some("manager-1"));
  assert!(done.approved_at.is_some() && done.completed_at.is_some());
  assert_eq!(done.moved_mass_grams, Some(20_000));
}

#[tokio::test]
async fn fifo_depletion_spans_batches_in_order() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  let b1 = produce(&s, &a, 5, 10, 5_000, t0()).await;
  let b2 = produce(&s, &a, 5, 7, 3_500, t0() + Duration::hours(1)).await;
  let b3 = produce(&s, &a, 5, 20, 10_000, t0() + Duration::hours(2)).await;

  // q1 + floor(q2 / 2)
  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(5, 13, 6_500)]))
    .await
    .unwrap();
  s.approve_transfer_batch(created[0].transfer_id, "manager-1".into())
    .await
    .unwrap();

  let batches = s.list_batches(a.location_id, size(5)).await.unwrap();
  assert_eq!(batches.len(), 3);
  assert_eq!(batches[0].batch_id, b1.batch_id);
  assert_eq!((batches[0].pieces, batches[0].mass_grams), (0, 0));
  assert_eq!(batches[1].batch_id, b2.batch_id);
  // ceil(q2 / 2)
  assert_eq!(batches[1].pieces, 4);
  assert_eq!(batches[1].mass_grams, 2_000);
  assert_eq!(batches[1].created_at, b2.created_at);
  assert_eq!(batches[2].batch_id, b3.batch_id);
  assert_eq!((batches[2].pieces, batches[2].mass_grams), (20, 10_000));

  let credited = s.list_batches(b.location_id, size(5)).await.unwrap();
  assert_eq!(credited.len(), 1);
  assert_eq!((credited[0].pieces, credited[0].mass_grams), (13, 6_500));
}

#[tokio::test]
async fn exact_drain_leaves_zero_quantity_audit_record() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  let only = produce(&s, &a, 2, 25, 7_500, t0()).await;

  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(2, 25, 7_500)]))
    .await
    .unwrap();
  s.approve_transfer_batch(created[0].transfer_id, "manager-1".into())
    .await
    .unwrap();

  let drained = s.get_batch(only.batch_id).await.unwrap().unwrap();
  assert!(drained.is_depleted());

  let rows = s.compute_inventory().await.unwrap();
  assert!(row(&rows, &a, 2).is_none());
  let empty_a = rows.iter().find(|r| r.location_id == a.location_id).unwrap();
  assert_eq!(empty_a.size_class, None);
}

#[tokio::test]
async fn approval_conserves_stock() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 1, 30, 9_000, t0()).await;
  produce(&s, &a, 1, 30, 9_900, t0() + Duration::minutes(5)).await;
  produce(&s, &b, 1, 5, 1_000, t0()).await;

  let before = s.compute_inventory().await.unwrap();
  let a_before = row(&before, &a, 1).unwrap().clone();
  let b_before = row(&before, &b, 1).unwrap().clone();

  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 45, 14_000)]))
    .await
    .unwrap();
  let outcome = s
    .approve_transfer_batch(created[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  let moved = outcome.approved[0].moved_mass_grams.unwrap();

  let after = s.compute_inventory().await.unwrap();
  let a_after = row(&after, &a, 1).unwrap();
  let b_after = row(&after, &b, 1).unwrap();

  assert_eq!(a_before.total_pieces - a_after.total_pieces, 45);
  assert_eq!(b_after.total_pieces - b_before.total_pieces, 45);
  assert_eq!(a_before.total_mass_grams - a_after.total_mass_grams, moved);
  assert_eq!(b_after.total_mass_grams - b_before.total_mass_grams, moved);
  // 9_000 from the first batch plus 15/30 of 9_900.
  assert_eq!(moved, 13_950);
}

#[tokio::test]
async fn approving_any_member_resolves_the_whole_group() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  for n in [1, 2, 4] {
    produce(&s, &a, n, 10, 1_000, t0()).await;
  }
  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 1, 100), (2, 2, 200), (4, 3, 300)]))
    .await
    .unwrap();

  let outcome = s
    .approve_transfer_batch(created[1].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(outcome.approved_count(), 3);
  assert_eq!(outcome.group_id, created[0].group_id);

  let group = s.list_transfer_group(outcome.group_id).await.unwrap();
  assert!(group.iter().all(|t| t.status == TransferStatus::Completed));
}

#[tokio::test]
async fn approval_revalidates_against_current_stock() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 3, 100, 50_000, t0()).await;

  let first = s
    .create_transfer_batch(transfer(&a, &b, &[(3, 60, 30_000)]))
    .await
    .unwrap();
  let second = s
    .create_transfer_batch(transfer(&a, &b, &[(3, 60, 30_000)]))
    .await
    .unwrap();

  let ok = s
    .approve_transfer_batch(first[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(ok.approved_count(), 1);

  let rejected = s
    .approve_transfer_batch(second[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(rejected.approved_count(), 0);
  assert_eq!(rejected.failed.len(), 1);
  assert!(matches!(
    rejected.failed[0].reason,
    FailureReason::InsufficientStock { available: Stock { pieces: 40, .. }, .. }
  ));

  let still = s.get_transfer(second[0].transfer_id).await.unwrap().unwrap();
  assert_eq!(still.status, TransferStatus::Pending);

  let rows = s.compute_inventory().await.unwrap();
  assert_eq!(row(&rows, &a, 3).unwrap().total_pieces, 40);
}

#[tokio::test]
async fn approval_capacity_is_judged_on_moved_mass() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;

  // Asks for more mass than five pieces proportionally carry.
  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 600)]))
    .await
    .unwrap();
  produce(&s, &b, 2, 1, 450, t0()).await;

  let outcome = s
    .approve_transfer_batch(created[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(outcome.approved_count(), 1, "{:?}", outcome.failed);
  assert_eq!(outcome.approved[0].moved_mass_grams, Some(500));
  assert_eq!(
    s.get_transfer(created[0].transfer_id).await.unwrap().unwrap(),
    outcome.approved[0]
  );

  let rows = s.compute_inventory().await.unwrap();
  assert_eq!(row(&rows, &b, 1).unwrap().usage_grams, 950);
}

#[tokio::test]
async fn partial_group_approval_reports_failures() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  let c = location(&s, "Cold C", 1_000_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;
  produce(&s, &a, 2, 10, 1_000, t0()).await;

  let group = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 500), (2, 8, 800)]))
    .await
    .unwrap();
  let rival = s
    .create_transfer_batch(transfer(&a, &c, &[(2, 5, 500)]))
    .await
    .unwrap();
  s.approve_transfer_batch(rival[0].transfer_id, "manager-1".into())
    .await
    .unwrap();

  let outcome = s
    .approve_transfer_batch(group[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(outcome.approved_count(), 1);
  assert_eq!(outcome.approved[0].size_class, size(1));
  assert_eq!(outcome.failed.len(), 1);
  assert_eq!(outcome.failed[0].size_class, size(2));

  let size2 = s.get_transfer(group[1].transfer_id).await.unwrap().unwrap();
  assert_eq!(size2.status, TransferStatus::Pending);
}

#[tokio::test]
async fn approval_fails_members_when_destination_deactivated() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;
  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 500)]))
    .await
    .unwrap();
  s.set_location_status(b.location_id, LocationStatus::Inactive)
    .await
    .unwrap();

  let outcome = s
    .approve_transfer_batch(created[0].transfer_id, "manager-1".into())
    .await
    .unwrap();
  assert_eq!(outcome.approved_count(), 0);
  assert!(matches!(outcome.failed[0].reason, FailureReason::InvalidLocation { .. }));
}

#[tokio::test]
async fn approve_unknown_transfer_errors() {
  let s = store().await;
  let err = s
    .approve_transfer_batch(Uuid::new_v4(), "manager-1".into())
    .await
    .unwrap_err();
  assert!(matches!(core_err(&err), shoal_core::Error::TransferNotFound(_)));
}

#[tokio::test]
async fn concurrent_approvals_cannot_overdraw() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 6, 100, 10_000, t0()).await;

  let first = s
    .create_transfer_batch(transfer(&a, &b, &[(6, 70, 7_000)]))
    .await
    .unwrap();
  let second = s
    .create_transfer_batch(transfer(&a, &b, &[(6, 70, 7_000)]))
    .await
    .unwrap();

  let (s1, s2) = (s.clone(), s.clone());
  let (r1, r2) = tokio::join!(
    s1.approve_transfer_batch(first[0].transfer_id, "m1".into()),
    s2.approve_transfer_batch(second[0].transfer_id, "m2".into()),
  );
  let approved = r1.unwrap().approved_count() + r2.unwrap().approved_count();
  assert_eq!(approved, 1);

  let batches = s.list_batches(a.location_id, size(6)).await.unwrap();
  assert!(batches.iter().all(|b| b.pieces >= 0 && b.mass_grams >= 0));
  assert_eq!(batches.iter().map(|b| b.pieces).sum::<i64>(), 30);
}

// ─── Decline ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn decline_resolves_group_without_touching_ledger() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  for n in [1, 2, 4] {
    produce(&s, &a, n, 10, 1_000, t0()).await;
  }
  let created = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 1, 100), (2, 2, 200), (4, 3, 300)]))
    .await
    .unwrap();

  let before = s.compute_inventory().await.unwrap();
  let outcome = s
    .decline_transfer_batch(created[2].transfer_id, "manager-2".into())
    .await
    .unwrap();
  assert_eq!(outcome.declined_count(), 3);
  assert!(outcome.declined.iter().all(|t| {
    t.status == TransferStatus::Declined
      && t.approved_by.as_deref() == Some("manager-2")
      && t.declined_at.is_some()
  }));

  let after = s.compute_inventory().await.unwrap();
  assert_eq!(before, after);
}

#[tokio::test]
async fn terminal_groups_are_not_acted_on_again() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  produce(&s, &a, 1, 10, 1_000, t0()).await;

  let declined = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 500)]))
    .await
    .unwrap();
  s.decline_transfer_batch(declined[0].transfer_id, "m".into())
    .await
    .unwrap();
  let again = s
    .approve_transfer_batch(declined[0].transfer_id, "m".into())
    .await
    .unwrap();
  assert_eq!(again.approved_count(), 0);
  assert!(again.failed.is_empty());

  let approved = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 500)]))
    .await
    .unwrap();
  s.approve_transfer_batch(approved[0].transfer_id, "m".into())
    .await
    .unwrap();
  let decline_after = s
    .decline_transfer_batch(approved[0].transfer_id, "m".into())
    .await
    .unwrap();
  assert_eq!(decline_after.declined_count(), 0);

  let t = s.get_transfer(approved[0].transfer_id).await.unwrap().unwrap();
  assert_eq!(t.status, TransferStatus::Completed);
}

#[tokio::test]
async fn list_transfers_filters_by_status_and_location() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let b = location(&s, "Cold B", 1_000_000).await;
  let c = location(&s, "Cold C", 1_000_000).await;
  produce(&s, &a, 1, 100, 10_000, t0()).await;

  let to_b = s
    .create_transfer_batch(transfer(&a, &b, &[(1, 5, 500)]))
    .await
    .unwrap();
  s.create_transfer_batch(transfer(&a, &c, &[(1, 5, 500)]))
    .await
    .unwrap();
  s.decline_transfer_batch(to_b[0].transfer_id, "m".into())
    .await
    .unwrap();

  let pending = s
    .list_transfers(&TransferFilter {
      status: Some(TransferStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].destination_location_id, c.location_id);

  let touching_b = s
    .list_transfers(&TransferFilter {
      location_id: Some(b.location_id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(touching_b.len(), 1);
  assert_eq!(touching_b[0].status, TransferStatus::Declined);

  let touching_a = s
    .list_transfers(&TransferFilter {
      location_id: Some(a.location_id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(touching_a.len(), 2);
}

// ─── Ledger invariants ───────────────────────────────────────────────────────

#[tokio::test]
async fn debit_below_zero_fails_and_leaves_batch_untouched() {
  let s = store().await;
  let a = location(&s, "Cold A", 1_000_000).await;
  let batch = produce(&s, &a, 1, 10, 1_000, t0()).await;
  let batch_id = batch.batch_id;

  let result = s
    .connection()
    .call(move |conn| {
      Ok(ledger::record_transfer_debit(conn, batch_id, Stock::new(11, 100)))
    })
    .await
    .unwrap();
  let err = result.unwrap_err();
  assert!(matches!(
    core_err(&err),
    shoal_core::Error::InsufficientBatchQuantity { batch_id: id, .. } if *id == batch_id
  ));

  let unchanged = s.get_batch(batch_id).await.unwrap().unwrap();
  assert_eq!((unchanged.pieces, unchanged.mass_grams), (10, 1_000));
}

#[tokio::test]
async fn ledger_survives_reopen() {
  let path = std::env::temp_dir().join(format!("shoal-{}.db", Uuid::new_v4()));
  let loc_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    let loc = location(&s, "Cold A", 100_000).await;
    produce(&s, &loc, 3, 100, 50_000, t0()).await;
    loc.location_id
  };

  let reopened = SqliteStore::open(&path).await.unwrap();
  let rows = reopened.compute_inventory().await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].location_id, loc_id);
  assert_eq!(rows[0].total_pieces, 100);

  drop(reopened);
  let _ = std::fs::remove_file(&path);
}
