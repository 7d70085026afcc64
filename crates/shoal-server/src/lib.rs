//! HTTP server wiring for Shoal: configuration and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use serde::Deserialize;
use shoal_core::store::InventoryStore;
use shoal_store_sqlite::StoreOptions;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `shoal.toml` and
/// `SHOAL_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  /// Retries for a transaction that lost a lock race.
  #[serde(default = "default_max_retries")]
  pub max_retries:     u32,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/shoal/shoal.db") }
fn default_max_retries() -> u32 { StoreOptions::default().max_retries }
fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      max_retries:  self.max_retries,
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The JSON API mounted under `/api`, with request tracing.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: InventoryStore + 'static,
{
  Router::new()
    .nest("/api", shoal_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
