//! `POST /targeting/query`.

use axum::{Json, extract::State};
use beacon_core::{
  query::{TargetingQuery, TargetingResponse},
  store::{MembershipStore, SubjectStore, TenantDirectory},
};
use tracing::debug;

use crate::{ApiState, auth::Authorized, error::ApiError};

/// Runs the query for an authorized service. The body is only parsed once
/// the caller has been authorized.
pub async fn query<S, M, D>(
  State(state): State<ApiState<S, M, D>>,
  Authorized(identity): Authorized,
  Json(request): Json<TargetingQuery>,
) -> Result<Json<TargetingResponse>, ApiError>
where
  S: SubjectStore + 'static,
  M: MembershipStore + 'static,
  D: TenantDirectory + 'static,
{
  debug!(client_id = %identity.client_id, "targeting query received");
  let response = state.engine.query(&request).await?;
  Ok(Json(response))
}
