//! Membership records: per (subject, business) accrual and coupon counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters a subject holds with one business. Owned by the membership store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub subject_id:       Uuid,
  pub business_id:      String,
  pub brand_id:         Option<String>,
  pub valid_stamps:     i64,
  /// Lifetime stamps; some stores never populate it.
  pub total_stamps:     Option<i64>,
  pub token_balance:    i64,
  pub valid_coupons:    i64,
  pub total_coupons:    i64,
  pub last_activity_at: Option<DateTime<Utc>>,
}

impl Membership {
  /// A membership with every counter at zero and no recorded activity.
  pub fn new(subject_id: Uuid, business_id: impl Into<String>) -> Self {
    Self {
      subject_id,
      business_id: business_id.into(),
      brand_id: None,
      valid_stamps: 0,
      total_stamps: None,
      token_balance: 0,
      valid_coupons: 0,
      total_coupons: 0,
      last_activity_at: None,
    }
  }
}

/// The counters attached to an enriched candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipStats {
  pub valid_stamps:     i64,
  pub total_stamps:     i64,
  pub token_balance:    i64,
  pub valid_coupons:    i64,
  pub last_activity_at: Option<DateTime<Utc>>,
}

impl From<&Membership> for MembershipStats {
  fn from(m: &Membership) -> Self {
    Self {
      valid_stamps:     m.valid_stamps,
      total_stamps:     m.total_stamps.unwrap_or(m.valid_stamps),
      token_balance:    m.token_balance,
      valid_coupons:    m.valid_coupons,
      last_activity_at: m.last_activity_at,
    }
  }
}

/// Deltas applied by [`MembershipStore::increment_coupons`](crate::store::MembershipStore::increment_coupons).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponIncrement {
  pub valid_delta: i64,
  pub total_delta: i64,
}

impl CouponIncrement {
  /// One more valid coupon, one more issued overall.
  pub const SINGLE: Self = Self { valid_delta: 1, total_delta: 1 };
}
