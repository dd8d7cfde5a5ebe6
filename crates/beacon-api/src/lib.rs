//! JSON API for Beacon.
//!
//! Exposes an axum [`Router`] backed by a [`TargetingEngine`] over any
//! `beacon-core` store implementation. Transport concerns (TLS, tracing
//! layers) are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/health` | Unauthenticated |
//! | `POST` | `/targeting/query` | Requires an allowed service identity |

pub mod auth;
pub mod error;
pub mod targeting;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use beacon_core::store::{MembershipStore, SubjectStore, TenantDirectory};
use beacon_engine::TargetingEngine;
use serde_json::{Value, json};

pub use auth::ServiceAuth;
pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S, M, D> {
  pub engine: Arc<TargetingEngine<S, M, D>>,
  pub auth:   Arc<ServiceAuth>,
}

// Manual impl: the store types need not be `Clone`.
impl<S, M, D> Clone for ApiState<S, M, D> {
  fn clone(&self) -> Self {
    Self {
      engine: Arc::clone(&self.engine),
      auth:   Arc::clone(&self.auth),
    }
  }
}

/// Build the API router. The returned `Router<()>` can be nested or merged
/// into any parent router.
pub fn api_router<S, M, D>(state: ApiState<S, M, D>) -> Router<()>
where
  S: SubjectStore + 'static,
  M: MembershipStore + 'static,
  D: TenantDirectory + 'static,
{
  Router::new()
    .route("/health", get(health))
    .route("/targeting/query", post(targeting::query::<S, M, D>))
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
