//! Service-to-service authorization.
//!
//! A [`ServiceVerifier`] turns request headers into a [`ServiceIdentity`];
//! [`ServiceAuth`] then checks that identity against the configured
//! allow-list. Only callers whose `client_id` or `audience` is allowed may
//! reach the engine.

use std::{collections::HashSet, sync::Arc};

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{ApiState, error::ApiError};

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
  pub client_id: String,
  pub audience:  String,
}

/// Extracts a caller identity from request headers.
pub trait ServiceVerifier: Send + Sync {
  /// `None` when the headers carry no valid credential.
  fn verify(&self, headers: &HeaderMap) -> Option<ServiceIdentity>;
}

/// A configured bearer credential. Only the token's digest is stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceCredential {
  pub client_id:    String,
  pub audience:     String,
  /// Lower-case hex SHA-256 of the bearer token.
  pub token_sha256: String,
}

/// Lower-case hex SHA-256 of `token`, the form credentials are configured in.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

/// Accepts `Authorization: Bearer <token>` whose digest matches a configured
/// credential.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
  credentials: Vec<ServiceCredential>,
}

impl StaticTokenVerifier {
  pub fn new(credentials: Vec<ServiceCredential>) -> Self { Self { credentials } }
}

impl ServiceVerifier for StaticTokenVerifier {
  fn verify(&self, headers: &HeaderMap) -> Option<ServiceIdentity> {
    let token = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())?;

    let digest = token_digest(token);
    self
      .credentials
      .iter()
      .find(|c| c.token_sha256.eq_ignore_ascii_case(&digest))
      .map(|c| ServiceIdentity {
        client_id: c.client_id.clone(),
        audience:  c.audience.clone(),
      })
  }
}

/// The authorization boundary in front of the engine.
#[derive(Clone)]
pub struct ServiceAuth {
  verifier: Arc<dyn ServiceVerifier>,
  allowed:  HashSet<String>,
}

impl ServiceAuth {
  pub fn new<V>(verifier: V, allowed: impl IntoIterator<Item = String>) -> Self
  where
    V: ServiceVerifier + 'static,
  {
    Self {
      verifier: Arc::new(verifier),
      allowed:  allowed.into_iter().collect(),
    }
  }

  /// The caller's identity, if it is verified and on the allow-list.
  pub fn permitted_identity(&self, headers: &HeaderMap) -> Option<ServiceIdentity> {
    let identity = self.verifier.verify(headers)?;
    let allowed =
      self.allowed.contains(&identity.client_id) || self.allowed.contains(&identity.audience);
    if !allowed {
      debug!(client_id = %identity.client_id, audience = %identity.audience, "service not on allow-list");
    }
    allowed.then_some(identity)
  }

  pub fn is_permitted(&self, headers: &HeaderMap) -> bool {
    self.permitted_identity(headers).is_some()
  }
}

/// Present in a handler means the caller passed [`ServiceAuth`].
pub struct Authorized(pub ServiceIdentity);

impl<S, M, D> FromRequestParts<ApiState<S, M, D>> for Authorized
where
  S: Send + Sync,
  M: Send + Sync,
  D: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S, M, D>,
  ) -> Result<Self, Self::Rejection> {
    state
      .auth
      .permitted_identity(&parts.headers)
      .map(Authorized)
      .ok_or_else(|| ApiError::Forbidden("service is not authorized for this endpoint".into()))
  }
}
