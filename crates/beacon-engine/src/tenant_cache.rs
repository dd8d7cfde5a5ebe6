//! Brand to business resolution with a bounded lifetime.

use std::{collections::HashMap, sync::Arc, time::Duration};

use beacon_core::store::TenantDirectory;
use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, warn};

/// Caches [`TenantDirectory::resolve_business_for_brand`] answers, including
/// negative ones, for `ttl`. Lookup errors are never cached. Expired entries
/// are purged whenever a new answer is stored.
pub struct TenantCache<D> {
  directory: Arc<D>,
  ttl:       Duration,
  entries:   RwLock<HashMap<String, (Option<String>, Instant)>>,
}

impl<D: TenantDirectory> TenantCache<D> {
  pub fn new(directory: Arc<D>, ttl: Duration) -> Self {
    Self { directory, ttl, entries: RwLock::new(HashMap::new()) }
  }

  /// The business owning `brand_id`, or `None` if it is unknown or the
  /// directory could not be reached.
  pub async fn resolve(&self, brand_id: &str) -> Option<String> {
    let fresh = self
      .entries
      .read()
      .await
      .get(brand_id)
      .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
      .map(|(business, _)| business.clone());
    if let Some(business) = fresh {
      return business;
    }

    match self.directory.resolve_business_for_brand(brand_id).await {
      Ok(business) => {
        debug!(brand_id, business = ?business, "resolved brand");
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, cached_at)| cached_at.elapsed() < self.ttl);
        entries.insert(brand_id.to_owned(), (business.clone(), Instant::now()));
        business
      }
      Err(e) => {
        warn!(brand_id, error = %e, "brand resolution failed");
        None
      }
    }
  }

  pub async fn invalidate(&self, brand_id: &str) { self.entries.write().await.remove(brand_id); }

  pub async fn clear(&self) { self.entries.write().await.clear(); }
}
