//! Query request and response shapes for the targeting endpoint.
//!
//! Request parsing is lenient: numeric and boolean inputs arrive from loosely
//! typed callers, so malformed values fall back to defaults instead of
//! rejecting the request. Page sizes and offsets are clamped by
//! [`Pagination::from_query`].

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  membership::MembershipStats,
  rule::TargetingRule,
  scope::Scope,
  subject::Subject,
};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

// ─── Request ─────────────────────────────────────────────────────────────────

/// Body of `POST /targeting/query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingQuery {
  #[serde(default, deserialize_with = "lenient::or_default")]
  pub targeting_rules: Vec<TargetingRule>,
  #[serde(default, deserialize_with = "lenient::opt_string")]
  pub search:          Option<String>,
  #[serde(default, deserialize_with = "lenient::keyword")]
  pub sort_by:         SortField,
  #[serde(default, deserialize_with = "lenient::keyword")]
  pub sort_order:      SortOrder,
  #[serde(default, deserialize_with = "lenient::or_default")]
  pub filters:         QueryFilters,
  #[serde(default, deserialize_with = "lenient::opt_string")]
  pub business_id:     Option<String>,
  #[serde(default, deserialize_with = "lenient::opt_string")]
  pub brand_id:        Option<String>,
  #[serde(default)]
  pub prize:           Option<PrizeRef>,
  #[serde(default, deserialize_with = "lenient::int")]
  pub limit:           Option<i64>,
  #[serde(default, deserialize_with = "lenient::int")]
  pub page:            Option<i64>,
  #[serde(default, deserialize_with = "lenient::int")]
  pub offset:          Option<i64>,
}

impl TargetingQuery {
  pub fn scope(&self) -> Scope {
    Scope::new(self.business_id.clone(), self.brand_id.clone())
  }

  /// The trimmed search string, if it is non-empty.
  pub fn search_term(&self) -> Option<&str> {
    self
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}

/// Numeric and temporal thresholds applied after enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilters {
  #[serde(default, deserialize_with = "lenient::int")]
  pub min_stamps:      Option<i64>,
  #[serde(default, deserialize_with = "lenient::flag")]
  pub coupons_only:    bool,
  #[serde(default, deserialize_with = "lenient::int")]
  pub last_visit_days: Option<i64>,
}

impl QueryFilters {
  /// Minimum valid stamps; zero or negative means no threshold.
  pub fn min_stamps(&self) -> Option<i64> { self.min_stamps.filter(|n| *n > 0) }

  /// Activity window in days; zero or negative means no window.
  pub fn last_visit_days(&self) -> Option<i64> {
    self.last_visit_days.filter(|n| *n > 0)
  }
}

/// The incentive a query is redeemed against. Its presence triggers the
/// coupon dispatch phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeRef {
  #[serde(deserialize_with = "lenient::id")]
  pub id: String,
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
  /// Total stamps, falling back to valid stamps.
  Stamps,
  Coupons,
  LastVisit,
  #[default]
  Name,
}

impl From<&str> for SortField {
  fn from(s: &str) -> Self {
    match s {
      "stamps" | "totalStamps" | "validStamps" => SortField::Stamps,
      "coupons" | "validCoupons" => SortField::Coupons,
      "lastVisit" | "last_visit" | "lastActivity" => SortField::LastVisit,
      _ => SortField::Name,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

impl From<&str> for SortOrder {
  fn from(s: &str) -> Self {
    if s.eq_ignore_ascii_case("desc") || s.eq_ignore_ascii_case("descending") {
      SortOrder::Desc
    } else {
      SortOrder::Asc
    }
  }
}

impl SortOrder {
  /// Apply this direction to an ascending comparison.
  pub fn apply(self, ordering: Ordering) -> Ordering {
    match self {
      SortOrder::Asc => ordering,
      SortOrder::Desc => ordering.reverse(),
    }
  }
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// Clamped page window derived from a [`TargetingQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  /// Always within `1..=MAX_PAGE_SIZE`.
  pub page_size: usize,
  pub offset:    usize,
}

impl Pagination {
  pub fn from_query(query: &TargetingQuery) -> Self {
    let page_size = query
      .limit
      .map_or(DEFAULT_PAGE_SIZE as i64, |n| n.clamp(1, MAX_PAGE_SIZE as i64))
      as usize;

    let offset = match query.offset {
      Some(offset) => offset.max(0) as usize,
      None => {
        let page = query.page.unwrap_or(1).max(1) as usize;
        (page - 1).saturating_mul(page_size)
      }
    };

    Self { page_size, offset }
  }
}

// ─── Enriched candidate ──────────────────────────────────────────────────────

/// A subject together with its membership counters for the requested scope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCandidate {
  pub subject:       Subject,
  /// `None` when no scope was requested, or no membership exists in it.
  pub stats:         Option<MembershipStats>,
  pub matches_scope: bool,
}

impl EnrichedCandidate {
  /// A candidate from a query without scope; it always matches.
  pub fn unscoped(subject: Subject) -> Self {
    Self { subject, stats: None, matches_scope: true }
  }

  /// A candidate from a scoped query; it matches only if a membership exists.
  pub fn scoped(subject: Subject, stats: Option<MembershipStats>) -> Self {
    let matches_scope = stats.is_some();
    Self { subject, stats, matches_scope }
  }

  pub fn valid_stamps(&self) -> i64 { self.stats.map_or(0, |s| s.valid_stamps) }

  pub fn total_stamps(&self) -> i64 { self.stats.map_or(0, |s| s.total_stamps) }

  pub fn token_balance(&self) -> i64 { self.stats.map_or(0, |s| s.token_balance) }

  pub fn valid_coupons(&self) -> i64 { self.stats.map_or(0, |s| s.valid_coupons) }

  pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
    self.stats.and_then(|s| s.last_activity_at)
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetingResponse {
  pub users: Vec<TargetedUser>,
}

impl TargetingResponse {
  pub fn from_page(page: &[EnrichedCandidate]) -> Self {
    Self { users: page.iter().map(TargetedUser::from).collect() }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetedUser {
  pub id:         Uuid,
  pub email:      Option<String>,
  pub phone:      Option<String>,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  /// Preferences merged with `birthday`, `stamps` and `tokens`.
  pub attributes: Map<String, Value>,
  pub stats:      UserStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
  pub valid_stamps:  i64,
  pub total_stamps:  i64,
  pub valid_coupons: i64,
  /// RFC 3339 with millisecond precision, e.g. `2026-10-15T09:30:00.000Z`.
  pub last_visit:    Option<String>,
}

impl From<&EnrichedCandidate> for TargetedUser {
  fn from(c: &EnrichedCandidate) -> Self {
    let subject = &c.subject;

    let mut attributes: Map<String, Value> = subject
      .preferences
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    attributes.insert(
      "birthday".into(),
      subject.birthday_iso().map_or(Value::Null, Value::String),
    );
    attributes.insert("stamps".into(), Value::from(c.valid_stamps()));
    attributes.insert("tokens".into(), Value::from(c.token_balance()));

    TargetedUser {
      id: subject.subject_id,
      email: subject.email.clone(),
      phone: subject.phone.clone(),
      first_name: subject.first_name.clone(),
      last_name: subject.last_name.clone(),
      attributes,
      stats: UserStats {
        valid_stamps:  c.valid_stamps(),
        total_stamps:  c.total_stamps(),
        valid_coupons: c.valid_coupons(),
        last_visit:    c
          .last_activity_at()
          .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
      },
    }
  }
}

// ─── Lenient field decoding ──────────────────────────────────────────────────

mod lenient {
  use serde::{Deserialize, Deserializer};
  use serde_json::Value;

  /// Integers given as JSON numbers or numeric strings; anything else is
  /// treated as absent.
  pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
      Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
      Some(Value::String(s)) => {
        let s = s.trim();
        s.parse::<i64>()
          .ok()
          .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
      }
      _ => None,
    })
  }

  pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
      Some(Value::Bool(b)) => b,
      Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
      Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
      _ => false,
    })
  }

  /// Enum-like keywords; unknown or non-string values select the default.
  pub fn keyword<'de, D, T>(d: D) -> Result<T, D::Error>
  where
    D: Deserializer<'de>,
    T: for<'a> From<&'a str> + Default,
  {
    Ok(match Option::<Value>::deserialize(d)? {
      Some(Value::String(s)) => T::from(s.trim()),
      _ => T::default(),
    })
  }

  pub fn opt_string<'de, D: Deserializer<'de>>(
    d: D,
  ) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
      Some(Value::String(s)) => Some(s),
      Some(Value::Number(n)) => Some(n.to_string()),
      _ => None,
    })
  }

  pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
      Value::String(s) => s,
      Value::Number(n) => n.to_string(),
      _ => String::new(),
    })
  }

  /// `null` behaves like an omitted field.
  pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
  where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
  {
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
  }
}
