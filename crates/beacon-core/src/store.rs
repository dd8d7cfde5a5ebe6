//! Collaborator traits consumed by the targeting engine.
//!
//! Storage backends (e.g. `beacon-store-sqlite`) implement these. The engine
//! depends only on the traits, never on a concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`), and from tasks
//! spawned onto them.

use std::future::Future;

use uuid::Uuid;

use crate::{
  membership::{CouponIncrement, Membership},
  scope::ScopeKey,
  subject::Subject,
};

// ─── Subjects ────────────────────────────────────────────────────────────────

/// Read access to subject records.
pub trait SubjectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Up to `limit` subjects, newest first (`created_at` descending).
  ///
  /// When `scope` is given, only subjects holding a membership in that scope
  /// are returned.
  fn list_candidates<'a>(
    &'a self,
    scope: Option<&'a ScopeKey>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  /// Whether `list_candidates` honours its `scope` argument. Backends that
  /// cannot filter by scope return `false` and are always called unscoped.
  fn supports_scoped_listing(&self) -> bool { true }
}

// ─── Memberships ─────────────────────────────────────────────────────────────

/// Read/increment access to per-scope membership counters.
///
/// For a [`ScopeKey::Brand`] lookup a subject may hold several memberships
/// (one per business of the brand); backends return a single record per
/// subject, the one with the most recent activity.
pub trait MembershipStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Bulk lookup of the memberships held by `subject_ids` in `scope`.
  /// Subjects without a membership are simply absent from the result.
  fn memberships_for<'a>(
    &'a self,
    scope: &'a ScopeKey,
    subject_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Membership>, Self::Error>> + Send + 'a;

  /// Single-record read. Returns `None` if the subject has no membership in
  /// `scope`.
  fn get_membership<'a>(
    &'a self,
    scope: &'a ScopeKey,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + 'a;

  /// Apply `increment` to the membership of `subject_id` with `business_id`,
  /// creating it if absent, and return the updated record.
  ///
  /// Implementations must apply the deltas atomically: two concurrent calls
  /// for the same membership both take effect.
  fn increment_coupons<'a>(
    &'a self,
    business_id: &'a str,
    subject_id: Uuid,
    increment: CouponIncrement,
  ) -> impl Future<Output = Result<Membership, Self::Error>> + Send + 'a;

  /// Whether `memberships_for` is worth calling. When `false`, the engine
  /// falls back to bounded per-subject `get_membership` reads.
  fn supports_bulk(&self) -> bool { true }
}

// ─── Tenants ─────────────────────────────────────────────────────────────────

/// Maps brand identifiers to the business that owns their memberships.
pub trait TenantDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn resolve_business_for_brand<'a>(
    &'a self,
    brand_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
