//! Candidate loading, the first pipeline stage.

use beacon_core::{scope::ScopeKey, store::SubjectStore, subject::Subject};
use tracing::debug;

use crate::EngineError;

/// Fetch up to `take` candidates, newest first, pre-filtered by `scope` when
/// the store can do so. A store failure here is fatal for the request.
pub async fn load<S>(
  store: &S,
  scope: Option<&ScopeKey>,
  take:  usize,
) -> Result<Vec<Subject>, EngineError>
where
  S: SubjectStore,
{
  let pushed_down = scope.filter(|_| store.supports_scoped_listing());

  let mut subjects = store
    .list_candidates(pushed_down, take)
    .await
    .map_err(|e| EngineError::Load(Box::new(e)))?;
  subjects.truncate(take);

  debug!(
    take,
    loaded = subjects.len(),
    scoped = pushed_down.is_some(),
    "loaded candidate window"
  );
  Ok(subjects)
}
