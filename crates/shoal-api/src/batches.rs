//! Handlers for `/batches` endpoints.
//!
//! Production output enters the ledger through `POST /batches`. Transfer
//! credits and debits never go through here.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use shoal_core::{
  batch::{Batch, NewBatch, SizeClass},
  store::InventoryStore,
};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub location_id: Uuid,
  pub size_class:  SizeClass,
}

/// `GET /batches?location_id=<id>&size_class=<n>` in FIFO order, depleted
/// batches included.
pub async fn list<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Batch>>, ApiError> {
  let batches = store
    .list_batches(params.location_id, params.size_class)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(batches))
}

/// `GET /batches/:id`
pub async fn get_one<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Batch>, ApiError> {
  let batch = store
    .get_batch(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("batch {id} not found")))?;
  Ok(Json(batch))
}

/// `POST /batches`: body is [`NewBatch`]; returns 201 + the stored batch.
pub async fn create<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewBatch>,
) -> Result<impl IntoResponse, ApiError> {
  let batch = store
    .record_production(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(batch)))
}
