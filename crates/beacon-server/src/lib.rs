//! Beacon server assembly: configuration and the application router.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use beacon_api::{
  ApiState, ServiceAuth,
  auth::{ServiceCredential, StaticTokenVerifier},
};
use beacon_core::store::{MembershipStore, SubjectStore, TenantDirectory};
use beacon_engine::{EngineConfig, TargetingEngine};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `BEACON_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Service client ids or audiences allowed to call the targeting endpoint.
  pub allowed_services: Vec<String>,
  pub credentials:      Vec<ServiceCredential>,
  pub engine:           EngineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      store_path:       PathBuf::from("beacon.db"),
      allowed_services: Vec::new(),
      credentials:      Vec::new(),
      engine:           EngineConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn service_auth(&self) -> ServiceAuth {
    ServiceAuth::new(
      StaticTokenVerifier::new(self.credentials.clone()),
      self.allowed_services.iter().cloned(),
    )
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the API router wrapped in request tracing. A single
/// store serves as subject store, membership store and tenant directory.
pub fn app<St>(store: Arc<St>, config: &ServerConfig) -> Router
where
  St: SubjectStore + MembershipStore + TenantDirectory + 'static,
{
  let engine = TargetingEngine::new(
    Arc::clone(&store),
    Arc::clone(&store),
    store,
    config.engine.clone(),
  );
  let state = ApiState {
    engine: Arc::new(engine),
    auth:   Arc::new(config.service_auth()),
  };
  beacon_api::api_router(state).layer(TraceLayer::new_for_http())
}
