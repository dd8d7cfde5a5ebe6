//! In-memory store doubles with injectable failures, shared by the stage
//! tests and the engine tests.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use beacon_core::{
  membership::{CouponIncrement, Membership},
  scope::ScopeKey,
  store::{MembershipStore, SubjectStore, TenantDirectory},
  subject::Subject,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FakeError(String);

#[derive(Default)]
struct State {
  /// Newest first.
  subjects:        Vec<Subject>,
  memberships:     HashMap<(Uuid, String), Membership>,
  brands:          HashMap<String, String>,
  fail_reads:      HashSet<Uuid>,
  fail_increments: HashSet<Uuid>,
}

pub struct FakeStore {
  state:            Mutex<State>,
  bulk:             bool,
  scoped_listing:   bool,
  fail_listing:     AtomicBool,
  fail_bulk:        AtomicBool,
  fail_directory:   AtomicBool,
  in_flight_reads:  AtomicUsize,
  pub bulk_calls:      AtomicUsize,
  pub single_reads:    AtomicUsize,
  pub peak_reads:      AtomicUsize,
  pub increments:      AtomicUsize,
  pub directory_calls: AtomicUsize,
}

/// Fixed reference instant; subject `i` is created `i` minutes before it.
pub fn epoch() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
}

impl FakeStore {
  pub fn new() -> Self {
    Self {
      state:           Mutex::new(State::default()),
      bulk:            true,
      scoped_listing:  true,
      fail_listing:    AtomicBool::new(false),
      fail_bulk:       AtomicBool::new(false),
      fail_directory:  AtomicBool::new(false),
      in_flight_reads: AtomicUsize::new(0),
      bulk_calls:      AtomicUsize::new(0),
      single_reads:    AtomicUsize::new(0),
      peak_reads:      AtomicUsize::new(0),
      increments:      AtomicUsize::new(0),
      directory_calls: AtomicUsize::new(0),
    }
  }

  /// `n` subjects named `Subject {i}` with email `user{i}@example.com`,
  /// subject 0 being the newest.
  pub fn with_subjects(n: usize) -> Self {
    let store = Self::new();
    for i in 0..n {
      let mut subject = Subject::new(Uuid::new_v4(), epoch() - Duration::minutes(i as i64));
      subject.first_name = Some("Subject".into());
      subject.last_name = Some(i.to_string());
      subject.email = Some(format!("user{i}@example.com"));
      store.push_subject(subject);
    }
    store
  }

  pub fn without_bulk(mut self) -> Self {
    self.bulk = false;
    self
  }

  pub fn without_scoped_listing(mut self) -> Self {
    self.scoped_listing = false;
    self
  }

  pub fn push_subject(&self, subject: Subject) {
    let mut state = self.state.lock().unwrap();
    state.subjects.push(subject);
    state.subjects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  }

  /// Mutate subject `i` in place.
  pub fn edit_subject(&self, i: usize, f: impl FnOnce(&mut Subject)) {
    f(&mut self.state.lock().unwrap().subjects[i]);
  }

  pub fn subject(&self, i: usize) -> Uuid { self.state.lock().unwrap().subjects[i].subject_id }

  pub fn subjects(&self) -> Vec<Subject> { self.state.lock().unwrap().subjects.clone() }

  pub fn add_membership(&self, subject_id: Uuid, business_id: &str) {
    self.put_membership(Membership::new(subject_id, business_id));
  }

  pub fn put_membership(&self, m: Membership) {
    let key = (m.subject_id, m.business_id.clone());
    self.state.lock().unwrap().memberships.insert(key, m);
  }

  pub fn membership(&self, subject_id: Uuid, business_id: &str) -> Option<Membership> {
    self
      .state
      .lock()
      .unwrap()
      .memberships
      .get(&(subject_id, business_id.to_owned()))
      .cloned()
  }

  pub fn map_brand(&self, brand_id: &str, business_id: &str) {
    self
      .state
      .lock()
      .unwrap()
      .brands
      .insert(brand_id.into(), business_id.into());
  }

  pub fn fail_listing(&self) { self.fail_listing.store(true, Ordering::SeqCst); }

  pub fn fail_bulk(&self) { self.fail_bulk.store(true, Ordering::SeqCst); }

  pub fn fail_directory(&self) { self.fail_directory.store(true, Ordering::SeqCst); }

  pub fn fail_read(&self, subject_id: Uuid) {
    self.state.lock().unwrap().fail_reads.insert(subject_id);
  }

  pub fn fail_increment(&self, subject_id: Uuid) {
    self.state.lock().unwrap().fail_increments.insert(subject_id);
  }

  fn in_scope(state: &State, scope: &ScopeKey, subject_id: Uuid) -> Option<Membership> {
    state
      .memberships
      .values()
      .filter(|m| m.subject_id == subject_id)
      .filter(|m| match scope {
        ScopeKey::Business(id) => &m.business_id == id,
        ScopeKey::Brand(id) => m.brand_id.as_ref() == Some(id),
      })
      .max_by(|a, b| {
        (a.last_activity_at, &a.business_id).cmp(&(b.last_activity_at, &b.business_id))
      })
      .cloned()
  }
}

impl SubjectStore for FakeStore {
  type Error = FakeError;

  async fn list_candidates<'a>(
    &'a self,
    scope: Option<&'a ScopeKey>,
    limit: usize,
  ) -> Result<Vec<Subject>, FakeError> {
    if self.fail_listing.load(Ordering::SeqCst) {
      return Err(FakeError("listing unavailable".into()));
    }
    let state = self.state.lock().unwrap();
    Ok(
      state
        .subjects
        .iter()
        .filter(|s| scope.is_none_or(|k| Self::in_scope(&state, k, s.subject_id).is_some()))
        .take(limit)
        .cloned()
        .collect(),
    )
  }

  fn supports_scoped_listing(&self) -> bool { self.scoped_listing }
}

impl MembershipStore for FakeStore {
  type Error = FakeError;

  async fn memberships_for<'a>(
    &'a self,
    scope: &'a ScopeKey,
    subject_ids: &'a [Uuid],
  ) -> Result<Vec<Membership>, FakeError> {
    self.bulk_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_bulk.load(Ordering::SeqCst) {
      return Err(FakeError("bulk lookup unavailable".into()));
    }
    let state = self.state.lock().unwrap();
    Ok(
      subject_ids
        .iter()
        .filter_map(|id| Self::in_scope(&state, scope, *id))
        .collect(),
    )
  }

  async fn get_membership<'a>(
    &'a self,
    scope: &'a ScopeKey,
    subject_id: Uuid,
  ) -> Result<Option<Membership>, FakeError> {
    self.single_reads.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight_reads.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak_reads.fetch_max(now, Ordering::SeqCst);
    tokio::task::yield_now().await;
    self.in_flight_reads.fetch_sub(1, Ordering::SeqCst);

    let state = self.state.lock().unwrap();
    if state.fail_reads.contains(&subject_id) {
      return Err(FakeError(format!("read failed for {subject_id}")));
    }
    Ok(Self::in_scope(&state, scope, subject_id))
  }

  async fn increment_coupons<'a>(
    &'a self,
    business_id: &'a str,
    subject_id: Uuid,
    increment: CouponIncrement,
  ) -> Result<Membership, FakeError> {
    self.increments.fetch_add(1, Ordering::SeqCst);
    let mut state = self.state.lock().unwrap();
    if state.fail_increments.contains(&subject_id) {
      return Err(FakeError(format!("increment failed for {subject_id}")));
    }
    let brand_id = state
      .brands
      .iter()
      .find(|(_, business)| business.as_str() == business_id)
      .map(|(brand, _)| brand.clone());
    let m = state
      .memberships
      .entry((subject_id, business_id.to_owned()))
      .or_insert_with(|| {
        let mut m = Membership::new(subject_id, business_id);
        m.brand_id = brand_id;
        m
      });
    m.valid_coupons += increment.valid_delta;
    m.total_coupons += increment.total_delta;
    Ok(m.clone())
  }

  fn supports_bulk(&self) -> bool { self.bulk }
}

impl TenantDirectory for FakeStore {
  type Error = FakeError;

  async fn resolve_business_for_brand<'a>(
    &'a self,
    brand_id: &'a str,
  ) -> Result<Option<String>, FakeError> {
    self.directory_calls.fetch_add(1, Ordering::SeqCst);
    if self.fail_directory.load(Ordering::SeqCst) {
      return Err(FakeError("directory unavailable".into()));
    }
    Ok(self.state.lock().unwrap().brands.get(brand_id).cloned())
  }
}
