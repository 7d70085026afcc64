//! Handlers for `/locations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/locations` | optional `?active_only=true` |
//! | `GET`  | `/locations/:id` | Single location |
//! | `POST` | `/locations` | Body: [`NewLocation`]; returns 201 + stored location |
//! | `POST` | `/locations/:id/status` | Body: `{"status":"inactive"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use shoal_core::{
  location::{LocationStatus, NewLocation, StorageLocation},
  store::InventoryStore,
};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub active_only: bool,
}

/// `GET /locations[?active_only=true]`
pub async fn list<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<StorageLocation>>, ApiError> {
  let locations = store
    .list_locations(params.active_only)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(locations))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /locations/:id`
pub async fn get_one<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<StorageLocation>, ApiError> {
  let location = store
    .get_location(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("storage location {id} not found")))?;
  Ok(Json(location))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /locations`
pub async fn create<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewLocation>,
) -> Result<impl IntoResponse, ApiError> {
  let location = store.add_location(body).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(location)))
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: LocationStatus,
}

/// `POST /locations/:id/status`
pub async fn set_status<S: InventoryStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StorageLocation>, ApiError> {
  let location = store
    .set_location_status(id, body.status)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(location))
}
