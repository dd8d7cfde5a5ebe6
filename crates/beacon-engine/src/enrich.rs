//! Enrichment: attach scoped membership counters to each candidate.
//!
//! With a scope, memberships are fetched in one bulk lookup keyed by the full
//! candidate set. If the store has no bulk lookup, or the bulk call fails,
//! each candidate is read individually through a bounded worker pool. A
//! failed read leaves that candidate without counters, which excludes it from
//! scoped results later; it never fails the batch.

use std::{collections::HashMap, sync::Arc};

use beacon_core::{
  membership::MembershipStats,
  query::EnrichedCandidate,
  scope::ScopeKey,
  store::MembershipStore,
  subject::Subject,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pool;

pub async fn enrich<M>(
  store:       Arc<M>,
  candidates:  Vec<Subject>,
  scope:       Option<&ScopeKey>,
  concurrency: usize,
) -> Vec<EnrichedCandidate>
where
  M: MembershipStore + 'static,
{
  let Some(scope) = scope else {
    return candidates.into_iter().map(EnrichedCandidate::unscoped).collect();
  };
  if candidates.is_empty() {
    return Vec::new();
  }

  if store.supports_bulk() {
    let ids: Vec<Uuid> = candidates.iter().map(|s| s.subject_id).collect();
    match store.memberships_for(scope, &ids).await {
      Ok(memberships) => {
        let by_subject: HashMap<Uuid, MembershipStats> = memberships
          .iter()
          .map(|m| (m.subject_id, MembershipStats::from(m)))
          .collect();
        debug!(
          candidates = candidates.len(),
          with_membership = by_subject.len(),
          "bulk membership enrichment"
        );
        return candidates
          .into_iter()
          .map(|s| {
            let stats = by_subject.get(&s.subject_id).copied();
            EnrichedCandidate::scoped(s, stats)
          })
          .collect();
      }
      Err(e) => {
        warn!(error = %e, scope = scope.id(), "bulk membership lookup failed, reading per subject");
      }
    }
  }

  enrich_each(store, candidates, scope.clone(), concurrency).await
}

/// Per-subject reads through the worker pool. Output keeps input order.
async fn enrich_each<M>(
  store:       Arc<M>,
  candidates:  Vec<Subject>,
  scope:       ScopeKey,
  concurrency: usize,
) -> Vec<EnrichedCandidate>
where
  M: MembershipStore + 'static,
{
  let work: Vec<(usize, Uuid)> = candidates
    .iter()
    .enumerate()
    .map(|(idx, s)| (idx, s.subject_id))
    .collect();

  let scope = Arc::new(scope);
  let results = pool::run(work, concurrency, move |(idx, subject_id)| {
    let store = Arc::clone(&store);
    let scope = Arc::clone(&scope);
    async move {
      let stats = match store.get_membership(&scope, subject_id).await {
        Ok(found) => found.as_ref().map(MembershipStats::from),
        Err(e) => {
          warn!(%subject_id, error = %e, "membership read failed, continuing without counters");
          None
        }
      };
      (idx, stats)
    }
  })
  .await;

  let mut stats_by_idx: Vec<Option<MembershipStats>> = vec![None; candidates.len()];
  for (idx, stats) in results {
    stats_by_idx[idx] = stats;
  }

  debug!(
    candidates = candidates.len(),
    with_membership = stats_by_idx.iter().filter(|s| s.is_some()).count(),
    concurrency,
    "per-subject membership enrichment"
  );

  candidates
    .into_iter()
    .zip(stats_by_idx)
    .map(|(s, stats)| EnrichedCandidate::scoped(s, stats))
    .collect()
}
