//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use shoal_core::DomainError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A business rule rejected the request.
  #[error("{message}")]
  Rejected {
    status:  StatusCode,
    message: String,
    details: Option<Value>,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it carries. Anything
  /// without one is an internal failure.
  pub fn from_store<E>(err: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    use shoal_core::Error as D;

    let Some(domain) = err.domain() else {
      return Self::Store(Box::new(err));
    };
    let message = domain.to_string();
    let (status, details) = match domain {
      D::LocationNotFound(_) | D::BatchNotFound(_) | D::TransferNotFound(_) => {
        return Self::NotFound(message);
      }
      D::InvalidLocation { .. } | D::InvalidQuantity(_) | D::SameLocation(_) => {
        return Self::BadRequest(message);
      }
      D::InsufficientStock(shortfalls) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Some(json!({
          "failed_sizes": domain.failed_sizes(),
          "shortfalls": shortfalls,
        })),
      ),
      D::InsufficientCapacity { location_id, required_grams, available_grams } => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Some(json!({
          "location_id": location_id,
          "required_grams": required_grams,
          "available_grams": available_grams,
        })),
      ),
      D::ConcurrentModification | D::InvalidTransition { .. } => {
        (StatusCode::CONFLICT, None)
      }
      D::QuantityOverflow(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
      D::InsufficientBatchQuantity { .. } => return Self::Store(Box::new(err)),
    };
    Self::Rejected { status, message, details }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message, details) = match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m, None),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, None),
      ApiError::Rejected { status, message, details } => (status, message, details),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
      }
    };

    let mut body = json!({ "error": message });
    if let (Some(details), Some(obj)) = (details, body.as_object_mut()) {
      obj.insert("details".into(), details);
    }
    (status, Json(body)).into_response()
  }
}
