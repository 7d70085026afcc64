//! Handler for `GET /inventory`.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use shoal_core::{inventory::InventoryRow, store::InventoryStore};

use crate::error::ApiError;

/// An [`InventoryRow`] with its masses also given in kilograms.
#[derive(Debug, Serialize)]
pub struct InventoryView {
  #[serde(flatten)]
  pub row:                   InventoryRow,
  pub capacity_kg:           f64,
  pub usage_kg:              f64,
  pub available_capacity_kg: f64,
  pub total_mass_kg:         f64,
}

fn kg(grams: i64) -> f64 { grams as f64 / 1000.0 }

impl From<InventoryRow> for InventoryView {
  fn from(row: InventoryRow) -> Self {
    Self {
      capacity_kg: kg(row.capacity_grams),
      usage_kg: kg(row.usage_grams),
      available_capacity_kg: kg(row.available_capacity_grams),
      total_mass_kg: kg(row.total_mass_grams),
      row,
    }
  }
}

/// `GET /inventory`
pub async fn handler<S: InventoryStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<InventoryView>>, ApiError> {
  let rows = store.compute_inventory().await.map_err(ApiError::from_store)?;
  Ok(Json(rows.into_iter().map(InventoryView::from).collect()))
}
