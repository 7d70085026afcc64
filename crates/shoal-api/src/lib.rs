//! JSON REST API for Shoal.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shoal_core::store::InventoryStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! Masses travel as integer grams in both directions; the inventory view
//! additionally carries `*_kg` fields for display.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", shoal_api::api_router(store.clone()))
//! ```

pub mod batches;
pub mod error;
pub mod inventory;
pub mod locations;
pub mod transfers;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use shoal_core::store::InventoryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: InventoryStore + 'static,
{
  Router::new()
    // Locations
    .route("/locations", get(locations::list::<S>).post(locations::create::<S>))
    .route("/locations/{id}", get(locations::get_one::<S>))
    .route("/locations/{id}/status", post(locations::set_status::<S>))
    // Batches
    .route("/batches", get(batches::list::<S>).post(batches::create::<S>))
    .route("/batches/{id}", get(batches::get_one::<S>))
    // Inventory
    .route("/inventory", get(inventory::handler::<S>))
    // Transfers
    .route("/transfers", get(transfers::list::<S>).post(transfers::create::<S>))
    .route("/transfers/{id}", get(transfers::get_one::<S>))
    .route("/transfers/{id}/group", get(transfers::group::<S>))
    .route("/transfers/{id}/approve", post(transfers::approve::<S>))
    .route("/transfers/{id}/decline", post(transfers::decline::<S>))
    .with_state(store)
}
