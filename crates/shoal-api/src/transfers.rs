//! Handlers for `/transfers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/transfers` | optional `?status`, `?location_id` |
//! | `POST` | `/transfers` | Body: [`NewTransferBody`]; returns 201 + the created group |
//! | `GET`  | `/transfers/:id` | Single request |
//! | `GET`  | `/transfers/:id/group` | Every member of the request's group |
//! | `POST` | `/transfers/:id/approve` | Body: [`ActorBody`]; acts on the whole group |
//! | `POST` | `/transfers/:id/decline` | Body: [`ActorBody`]; acts on the whole group |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use shoal_core::{
  batch::SizeClass,
  inventory::Stock,
  store::InventoryStore,
  transfer::{
    ApprovalOutcome, DeclineOutcome, NewTransferBatch, TransferFilter,
    TransferRequest,
  },
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /transfers[?status=pending][&location_id=<id>]`, newest first.
pub async fn list<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Query(filter): Query<TransferFilter>,
) -> Result<Json<Vec<TransferRequest>>, ApiError> {
  let transfers = store
    .list_transfers(&filter)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(transfers))
}

// ─── Get ─────────────────────────────────────────────────────────────────────

/// `GET /transfers/:id`
pub async fn get_one<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<TransferRequest>, ApiError> {
  let transfer = store
    .get_transfer(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("transfer request {id} not found")))?;
  Ok(Json(transfer))
}

/// `GET /transfers/:id/group`
pub async fn group<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransferRequest>>, ApiError> {
  let anchor = store
    .get_transfer(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("transfer request {id} not found")))?;
  let members = store
    .list_transfer_group(anchor.group_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(members))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SizeLine {
  pub size_class: SizeClass,
  pub pieces:     i64,
  pub mass_grams: i64,
}

/// JSON body accepted by `POST /transfers`.
#[derive(Debug, Deserialize)]
pub struct NewTransferBody {
  pub source_location_id:      Uuid,
  pub destination_location_id: Uuid,
  pub sizes:                   Vec<SizeLine>,
  pub requested_by:            String,
  pub notes:                   Option<String>,
}

impl TryFrom<NewTransferBody> for NewTransferBatch {
  type Error = ApiError;

  fn try_from(b: NewTransferBody) -> Result<Self, ApiError> {
    let mut sizes = BTreeMap::new();
    for line in b.sizes {
      let amount = Stock::new(line.pieces, line.mass_grams);
      if sizes.insert(line.size_class, amount).is_some() {
        return Err(ApiError::BadRequest(format!(
          "size class {} listed more than once",
          line.size_class
        )));
      }
    }
    Ok(NewTransferBatch {
      source_location_id: b.source_location_id,
      destination_location_id: b.destination_location_id,
      sizes,
      requested_by: b.requested_by,
      notes: b.notes,
    })
  }
}

/// `POST /transfers`: returns 201 + one pending request per size class.
pub async fn create<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewTransferBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewTransferBatch::try_from(body)?;
  let created = store
    .create_transfer_batch(input)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Approve / decline ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActorBody {
  pub approver: String,
}

/// `POST /transfers/:id/approve`
///
/// Partial success is still `200`; members that failed re-validation are
/// listed under `failed` and stay pending.
pub async fn approve<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<ApprovalOutcome>, ApiError> {
  let outcome = store
    .approve_transfer_batch(id, body.approver)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcome))
}

/// `POST /transfers/:id/decline`
pub async fn decline<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActorBody>,
) -> Result<Json<DeclineOutcome>, ApiError> {
  let outcome = store
    .decline_transfer_batch(id, body.approver)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcome))
}
