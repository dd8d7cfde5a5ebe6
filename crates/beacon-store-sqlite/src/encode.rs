//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order equals chronological order. Dates are `YYYY-MM-DD`.
//! Preferences are stored as a compact JSON object. UUIDs are stored as
//! hyphenated lowercase strings.

use beacon_core::{
  membership::Membership,
  subject::{Preferences, Subject},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Preferences ──────────────────────────────────────────────────────────────

pub fn encode_preferences(p: &Preferences) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_preferences(s: &str) -> Result<Preferences> {
  Ok(serde_json::from_str(s)?)
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// Column list matching [`RawSubject::from_row`]; expects alias `s`.
pub const SUBJECT_COLUMNS: &str = "s.subject_id, s.created_at, s.email, s.phone, \
   s.first_name, s.last_name, s.birthday, s.preferences";

/// A `subjects` row as read from SQLite, before decoding.
pub struct RawSubject {
  pub subject_id:  String,
  pub created_at:  String,
  pub email:       Option<String>,
  pub phone:       Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub birthday:    Option<String>,
  pub preferences: String,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:  row.get(0)?,
      created_at:  row.get(1)?,
      email:       row.get(2)?,
      phone:       row.get(3)?,
      first_name:  row.get(4)?,
      last_name:   row.get(5)?,
      birthday:    row.get(6)?,
      preferences: row.get(7)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:  decode_uuid(&self.subject_id)?,
      created_at:  decode_dt(&self.created_at)?,
      email:       self.email,
      phone:       self.phone,
      first_name:  self.first_name,
      last_name:   self.last_name,
      birthday:    self.birthday.as_deref().map(decode_date).transpose()?,
      preferences: decode_preferences(&self.preferences)?,
    })
  }
}

/// Column list matching [`RawMembership::from_row`].
pub const MEMBERSHIP_COLUMNS: &str = "subject_id, business_id, brand_id, \
   valid_stamps, total_stamps, token_balance, valid_coupons, total_coupons, \
   last_activity_at";

/// A `memberships` row as read from SQLite, before decoding.
pub struct RawMembership {
  pub subject_id:       String,
  pub business_id:      String,
  pub brand_id:         Option<String>,
  pub valid_stamps:     i64,
  pub total_stamps:     Option<i64>,
  pub token_balance:    i64,
  pub valid_coupons:    i64,
  pub total_coupons:    i64,
  pub last_activity_at: Option<String>,
}

impl RawMembership {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:       row.get(0)?,
      business_id:      row.get(1)?,
      brand_id:         row.get(2)?,
      valid_stamps:     row.get(3)?,
      total_stamps:     row.get(4)?,
      token_balance:    row.get(5)?,
      valid_coupons:    row.get(6)?,
      total_coupons:    row.get(7)?,
      last_activity_at: row.get(8)?,
    })
  }

  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      subject_id:       decode_uuid(&self.subject_id)?,
      business_id:      self.business_id,
      brand_id:         self.brand_id,
      valid_stamps:     self.valid_stamps,
      total_stamps:     self.total_stamps,
      token_balance:    self.token_balance,
      valid_coupons:    self.valid_coupons,
      total_coupons:    self.total_coupons,
      last_activity_at: self.last_activity_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
