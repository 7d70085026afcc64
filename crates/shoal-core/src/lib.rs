//! Core types and trait definitions for the Shoal fish inventory engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Aggregation, FIFO planning and transfer validation are pure functions
//! over snapshots so every backend applies exactly the same rules.

// Backends implement the store trait with plain `async fn`.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod error;
pub mod fifo;
pub mod inventory;
pub mod location;
pub mod store;
pub mod transfer;

pub use error::{DomainError, Error, Result};
