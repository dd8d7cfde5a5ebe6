//! [`TargetingEngine`] composes the pipeline stages over the store traits.

use std::{sync::Arc, time::Instant};

use beacon_core::{
  query::{EnrichedCandidate, Pagination, TargetingQuery, TargetingResponse},
  scope::Scope,
  store::{MembershipStore, SubjectStore, TenantDirectory},
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
  EngineConfig, EngineError,
  dispatch::{self, DispatchReport},
  enrich::enrich,
  filter::Filters,
  loader,
  page::{self, window_take},
  tenant_cache::TenantCache,
};

/// The response of one query together with what its side effects did.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
  pub response: TargetingResponse,
  /// `None` when the query carried no prize or no target business resolved.
  pub dispatch: Option<DispatchReport>,
}

/// Runs targeting queries. Cheap to share behind an `Arc`; holds no
/// per-request state.
pub struct TargetingEngine<S, M, D> {
  subjects:    Arc<S>,
  memberships: Arc<M>,
  tenants:     TenantCache<D>,
  config:      EngineConfig,
}

impl<S, M, D> TargetingEngine<S, M, D>
where
  S: SubjectStore + 'static,
  M: MembershipStore + 'static,
  D: TenantDirectory + 'static,
{
  pub fn new(subjects: Arc<S>, memberships: Arc<M>, directory: Arc<D>, config: EngineConfig) -> Self {
    let tenants = TenantCache::new(directory, config.tenant_cache_ttl());
    Self { subjects, memberships, tenants, config }
  }

  pub fn config(&self) -> &EngineConfig { &self.config }

  pub fn tenant_cache(&self) -> &TenantCache<D> { &self.tenants }

  pub async fn query(&self, request: &TargetingQuery) -> Result<TargetingResponse, EngineError> {
    self.query_at(request, Utc::now()).await
  }

  /// [`query`](Self::query) against an explicit reference clock, which fixes
  /// both placeholder resolution and the activity window.
  pub async fn query_at(
    &self,
    request: &TargetingQuery,
    now:     DateTime<Utc>,
  ) -> Result<TargetingResponse, EngineError> {
    Ok(self.execute(request, now).await?.response)
  }

  pub async fn execute(
    &self,
    request: &TargetingQuery,
    now:     DateTime<Utc>,
  ) -> Result<QueryOutcome, EngineError> {
    let started    = Instant::now();
    let pagination = Pagination::from_query(request);
    let filters    = Filters::from_query(request, now);
    let scope      = request.scope();
    let scope_key  = scope.key();

    let take = window_take(
      pagination.offset,
      pagination.page_size,
      filters.search.is_some(),
      self.config.max_take,
    );

    let loaded = loader::load(self.subjects.as_ref(), scope_key.as_ref(), take).await?;
    let loaded_count = loaded.len();

    let enriched = enrich(
      Arc::clone(&self.memberships),
      loaded,
      scope_key.as_ref(),
      self.config.enrich_concurrency,
    )
    .await;

    let mut matched = filters.apply(enriched);
    let matched_count = matched.len();

    page::sort(&mut matched, request.sort_by, request.sort_order);
    let page = page::paginate(matched, pagination.offset, pagination.page_size);
    debug!(
      offset = pagination.offset,
      page_size = pagination.page_size,
      returned = page.len(),
      "paged results"
    );

    let dispatch = match &request.prize {
      Some(prize) => self.dispatch(&scope, &prize.id, &page).await,
      None => None,
    };

    let response = TargetingResponse::from_page(&page);
    info!(
      take,
      loaded = loaded_count,
      matched = matched_count,
      returned = response.users.len(),
      rules = filters.rules.len(),
      search = filters.search.is_some(),
      scoped = scope.is_required(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "targeting query"
    );

    Ok(QueryOutcome { response, dispatch })
  }

  async fn dispatch(
    &self,
    scope:    &Scope,
    prize_id: &str,
    page:     &[EnrichedCandidate],
  ) -> Option<DispatchReport> {
    let business = match (&scope.business_id, &scope.brand_id) {
      (Some(business), _) => Some(business.clone()),
      (None, Some(brand)) => self.tenants.resolve(brand).await,
      (None, None) => None,
    };
    let Some(business) = business else {
      info!(prize_id, "no target business for prize, skipping coupon dispatch");
      return None;
    };

    let ids = page.iter().map(|c| c.subject.subject_id).collect();
    let report = dispatch::dispatch(
      Arc::clone(&self.memberships),
      business.clone(),
      ids,
      self.config.dispatch_concurrency,
    )
    .await;
    info!(
      prize_id,
      business_id = %business,
      attempted = report.attempted,
      succeeded = report.succeeded,
      failed = report.failed,
      "coupon dispatch finished"
    );
    Some(report)
  }
}
