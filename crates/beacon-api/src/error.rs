//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use beacon_engine::EngineError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler. Every variant renders as
/// `{"error":{"code":..,"message":..}}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Stable machine-readable code.
  pub fn code(&self) -> &'static str {
    match self {
      ApiError::Forbidden(_) => "forbidden",
      ApiError::Internal(_) => "internal",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<EngineError> for ApiError {
  fn from(e: EngineError) -> Self { ApiError::Internal(Box::new(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::Forbidden(m) => m.clone(),
      ApiError::Internal(e) => {
        error!(error = %e, "request failed");
        "internal error".to_owned()
      }
    };
    let body = json!({ "error": { "code": self.code(), "message": message } });
    (self.status(), Json(body)).into_response()
  }
}
