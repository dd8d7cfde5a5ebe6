//! Coupon dispatch, the side-effect phase of a query carrying a prize.
//!
//! Every subject on the final page gets its coupon counters incremented in the
//! target business. Each subject is independent: a failed read or write is
//! logged and counted, and never aborts the rest of the batch or the query.

use std::sync::Arc;

use beacon_core::{membership::CouponIncrement, scope::ScopeKey, store::MembershipStore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pool;

/// Outcome counts of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub attempted: usize,
  pub succeeded: usize,
  pub failed:    usize,
}

pub async fn dispatch<M>(
  store:       Arc<M>,
  business_id: String,
  subject_ids: Vec<Uuid>,
  workers:     usize,
) -> DispatchReport
where
  M: MembershipStore + 'static,
{
  let attempted = subject_ids.len();
  let business  = Arc::new(business_id);

  let outcomes = pool::run(subject_ids, workers, move |subject_id| {
    let store    = Arc::clone(&store);
    let business = Arc::clone(&business);
    async move { award(store.as_ref(), &business, subject_id).await }
  })
  .await;

  let succeeded = outcomes.iter().filter(|ok| **ok).count();
  DispatchReport {
    attempted,
    succeeded,
    failed: attempted - succeeded,
  }
}

/// Read the current membership, then apply a single coupon increment.
async fn award<M: MembershipStore>(store: &M, business_id: &str, subject_id: Uuid) -> bool {
  let scope = ScopeKey::Business(business_id.to_owned());
  let before = match store.get_membership(&scope, subject_id).await {
    Ok(m) => m.map_or(0, |m| m.valid_coupons),
    Err(e) => {
      warn!(%subject_id, business_id, error = %e, "coupon dispatch: membership read failed");
      return false;
    }
  };

  match store
    .increment_coupons(business_id, subject_id, CouponIncrement::SINGLE)
    .await
  {
    Ok(updated) => {
      debug!(%subject_id, business_id, before, after = updated.valid_coupons, "coupon awarded");
      true
    }
    Err(e) => {
      warn!(%subject_id, business_id, error = %e, "coupon dispatch: increment failed");
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use super::*;
  use crate::fakes::FakeStore;

  #[tokio::test]
  async fn increments_every_subject_once() {
    let store = Arc::new(FakeStore::with_subjects(5));
    let ids: Vec<Uuid> = (0..5).map(|i| store.subject(i)).collect();
    store.add_membership(ids[0], "biz-1");

    let report = dispatch(Arc::clone(&store), "biz-1".into(), ids.clone(), 12).await;
    assert_eq!(report, DispatchReport { attempted: 5, succeeded: 5, failed: 0 });

    for id in ids {
      let m = store.membership(id, "biz-1").unwrap();
      assert_eq!((m.valid_coupons, m.total_coupons), (1, 1));
    }
  }

  #[tokio::test]
  async fn failures_are_counted_not_propagated() {
    let store = Arc::new(FakeStore::with_subjects(3));
    let ids: Vec<Uuid> = (0..3).map(|i| store.subject(i)).collect();
    store.fail_increment(ids[1]);

    let report = dispatch(Arc::clone(&store), "biz-1".into(), ids.clone(), 12).await;
    assert_eq!(report, DispatchReport { attempted: 3, succeeded: 2, failed: 1 });
    assert!(store.membership(ids[1], "biz-1").is_none());
    assert_eq!(store.membership(ids[2], "biz-1").unwrap().valid_coupons, 1);
  }

  #[tokio::test]
  async fn failed_read_skips_the_write() {
    let store = Arc::new(FakeStore::with_subjects(2));
    let ids: Vec<Uuid> = (0..2).map(|i| store.subject(i)).collect();
    store.fail_read(ids[0]);

    let report = dispatch(Arc::clone(&store), "biz-1".into(), ids, 2).await;
    assert_eq!(report.failed, 1);
    assert_eq!(store.increments.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn repeated_dispatch_is_additive_on_sqlite() {
    use beacon_core::subject::Subject;
    use beacon_store_sqlite::SqliteStore;
    use chrono::Utc;

    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let subject = Subject::new(Uuid::new_v4(), Utc::now());
    store.insert_subject(&subject).await.unwrap();

    // The same subject queued many times races on one membership row.
    let ids = vec![subject.subject_id; 30];
    let report = dispatch(Arc::clone(&store), "biz-1".into(), ids, 12).await;
    assert_eq!(report.succeeded, 30);

    let scope = ScopeKey::Business("biz-1".into());
    let m = store.get_membership(&scope, subject.subject_id).await.unwrap().unwrap();
    assert_eq!((m.valid_coupons, m.total_coupons), (30, 30));
  }
}
