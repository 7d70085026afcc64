//! SQLite backend for the Shoal inventory engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every operation is one transaction;
//! writers use `BEGIN IMMEDIATE`, so two approvals touching the same stock
//! can never interleave.

mod encode;
mod ledger;
mod registry;
mod schema;
mod store;
mod workflow;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
