//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use beacon_core::{
  membership::{CouponIncrement, Membership},
  scope::ScopeKey,
  store::{MembershipStore, SubjectStore, TenantDirectory},
  subject::Subject,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Insert a subject created `minutes` after a fixed epoch.
async fn subject(s: &SqliteStore, minutes: i64, email: &str) -> Subject {
  let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
  let mut subject = Subject::new(Uuid::new_v4(), base + Duration::minutes(minutes));
  subject.email = Some(email.into());
  s.insert_subject(&subject).await.unwrap();
  subject
}

async fn member(s: &SqliteStore, subject: &Subject, business: &str, brand: Option<&str>) -> Membership {
  let mut m = Membership::new(subject.subject_id, business);
  m.brand_id = brand.map(str::to_owned);
  m.valid_stamps = 3;
  s.upsert_membership(&m).await.unwrap();
  m
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subject_fields_roundtrip() {
  let s = store().await;

  let mut input = Subject::new(Uuid::new_v4(), Utc::now());
  input.email = Some("ada@example.com".into());
  input.phone = Some("+39 333 1234567".into());
  input.first_name = Some("Ada".into());
  input.last_name = Some("Lovelace".into());
  input.birthday = NaiveDate::from_ymd_opt(1990, 12, 10);
  input.preferences.insert("newsletter".into(), json!(true));
  input.preferences.insert("city".into(), json!("Turin"));
  s.insert_subject(&input).await.unwrap();

  let listed = s.list_candidates(None, 10).await.unwrap();
  assert_eq!(listed.len(), 1);
  let got = &listed[0];
  assert_eq!(got.subject_id, input.subject_id);
  assert_eq!(got.phone, input.phone);
  assert_eq!(got.birthday, input.birthday);
  assert_eq!(got.preferences, input.preferences);
  // Stored with microsecond precision.
  assert_eq!(got.created_at.timestamp_micros(), input.created_at.timestamp_micros());
}

#[tokio::test]
async fn list_candidates_newest_first_and_limited() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  let b = subject(&s, 2, "b@x").await;
  let c = subject(&s, 3, "c@x").await;

  let all = s.list_candidates(None, 10).await.unwrap();
  let ids: Vec<Uuid> = all.iter().map(|s| s.subject_id).collect();
  assert_eq!(ids, vec![c.subject_id, b.subject_id, a.subject_id]);

  let two = s.list_candidates(None, 2).await.unwrap();
  assert_eq!(two.len(), 2);
  assert_eq!(two[0].subject_id, c.subject_id);
}

#[tokio::test]
async fn list_candidates_scoped_by_business_and_brand() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  let b = subject(&s, 2, "b@x").await;
  let _c = subject(&s, 3, "c@x").await;
  member(&s, &a, "biz-1", Some("brand-1")).await;
  member(&s, &b, "biz-2", Some("brand-1")).await;

  let biz = ScopeKey::Business("biz-1".into());
  let scoped = s.list_candidates(Some(&biz), 10).await.unwrap();
  assert_eq!(scoped.len(), 1);
  assert_eq!(scoped[0].subject_id, a.subject_id);

  let brand = ScopeKey::Brand("brand-1".into());
  let scoped = s.list_candidates(Some(&brand), 10).await.unwrap();
  let ids: Vec<Uuid> = scoped.iter().map(|s| s.subject_id).collect();
  assert_eq!(ids, vec![b.subject_id, a.subject_id]);
}

// ─── Memberships ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_lookup_returns_only_existing_memberships() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  let b = subject(&s, 2, "b@x").await;
  member(&s, &a, "biz-1", None).await;

  let scope = ScopeKey::Business("biz-1".into());
  let found = s
    .memberships_for(&scope, &[a.subject_id, b.subject_id])
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].subject_id, a.subject_id);
  assert_eq!(found[0].valid_stamps, 3);

  let none = s.memberships_for(&scope, &[]).await.unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn bulk_lookup_handles_more_ids_than_one_chunk() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  member(&s, &a, "biz-1", None).await;

  let mut ids: Vec<Uuid> = (0..1200).map(|_| Uuid::new_v4()).collect();
  ids.push(a.subject_id);

  let scope = ScopeKey::Business("biz-1".into());
  let found = s.memberships_for(&scope, &ids).await.unwrap();
  assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn brand_lookup_prefers_most_recent_activity() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;

  let mut old = Membership::new(a.subject_id, "biz-1");
  old.brand_id = Some("brand-1".into());
  old.valid_stamps = 1;
  old.last_activity_at = Some(Utc::now() - Duration::days(10));
  s.upsert_membership(&old).await.unwrap();

  let mut recent = Membership::new(a.subject_id, "biz-2");
  recent.brand_id = Some("brand-1".into());
  recent.valid_stamps = 7;
  recent.last_activity_at = Some(Utc::now() - Duration::days(1));
  s.upsert_membership(&recent).await.unwrap();

  let scope = ScopeKey::Brand("brand-1".into());
  let got = s.get_membership(&scope, a.subject_id).await.unwrap().unwrap();
  assert_eq!(got.business_id, "biz-2");
  assert_eq!(got.valid_stamps, 7);
}

#[tokio::test]
async fn get_membership_missing_returns_none() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  let scope = ScopeKey::Business("biz-1".into());
  assert!(s.get_membership(&scope, a.subject_id).await.unwrap().is_none());
}

#[tokio::test]
async fn increment_updates_existing_membership() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  let mut m = Membership::new(a.subject_id, "biz-1");
  m.valid_coupons = 2;
  m.total_coupons = 5;
  s.upsert_membership(&m).await.unwrap();

  let updated = s
    .increment_coupons("biz-1", a.subject_id, CouponIncrement::SINGLE)
    .await
    .unwrap();
  assert_eq!(updated.valid_coupons, 3);
  assert_eq!(updated.total_coupons, 6);
  assert_eq!(updated.valid_stamps, 0);
}

#[tokio::test]
async fn increment_creates_missing_membership_with_brand() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  s.map_brand("brand-1", "biz-1").await.unwrap();

  let created = s
    .increment_coupons("biz-1", a.subject_id, CouponIncrement::SINGLE)
    .await
    .unwrap();
  assert_eq!(created.valid_coupons, 1);
  assert_eq!(created.total_coupons, 1);
  assert_eq!(created.brand_id.as_deref(), Some("brand-1"));
}

#[tokio::test]
async fn increment_picks_lowest_brand_when_business_has_several() {
  let s = store().await;
  let a = subject(&s, 1, "a@x").await;
  s.map_brand("brand-b", "biz-1").await.unwrap();
  s.map_brand("brand-a", "biz-1").await.unwrap();
  s.map_brand("brand-c", "biz-1").await.unwrap();

  let created = s
    .increment_coupons("biz-1", a.subject_id, CouponIncrement::SINGLE)
    .await
    .unwrap();
  assert_eq!(created.brand_id.as_deref(), Some("brand-a"));
}

#[tokio::test]
async fn increment_unknown_subject_errors() {
  let s = store().await;
  let err = s
    .increment_coupons("biz-1", Uuid::new_v4(), CouponIncrement::SINGLE)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::SubjectNotFound(_)));
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
  let s = Arc::new(store().await);
  let a = subject(&s, 1, "a@x").await;

  let mut handles = Vec::new();
  for _ in 0..20 {
    let s = Arc::clone(&s);
    let id = a.subject_id;
    handles.push(tokio::spawn(async move {
      s.increment_coupons("biz-1", id, CouponIncrement::SINGLE)
        .await
        .unwrap();
    }));
  }
  for h in handles {
    h.await.unwrap();
  }

  let scope = ScopeKey::Business("biz-1".into());
  let m = s.get_membership(&scope, a.subject_id).await.unwrap().unwrap();
  assert_eq!(m.valid_coupons, 20);
  assert_eq!(m.total_coupons, 20);
}

// ─── Tenants ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn brand_resolves_to_business() {
  let s = store().await;
  s.map_brand("brand-1", "biz-1").await.unwrap();

  assert_eq!(
    s.resolve_business_for_brand("brand-1").await.unwrap().as_deref(),
    Some("biz-1")
  );
  assert_eq!(s.resolve_business_for_brand("brand-2").await.unwrap(), None);
}
