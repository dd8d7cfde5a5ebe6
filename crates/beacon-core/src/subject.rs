//! Subject: the user-like record that targeting queries select.
//!
//! Subjects are owned by an external store; the engine only reads them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant-defined, loosely-typed preference values keyed by name.
pub type Preferences = BTreeMap<String, serde_json::Value>;

/// A subject record as returned by a [`SubjectStore`](crate::store::SubjectStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:  Uuid,
  pub created_at:  DateTime<Utc>,
  pub email:       Option<String>,
  pub phone:       Option<String>,
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub birthday:    Option<NaiveDate>,
  #[serde(default)]
  pub preferences: Preferences,
}

impl Subject {
  /// A subject with only identity metadata set.
  pub fn new(subject_id: Uuid, created_at: DateTime<Utc>) -> Self {
    Self {
      subject_id,
      created_at,
      email: None,
      phone: None,
      first_name: None,
      last_name: None,
      birthday: None,
      preferences: Preferences::new(),
    }
  }

  /// First and last name joined by a single space; empty parts are skipped.
  pub fn full_name(&self) -> String {
    [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .map(str::trim)
      .filter(|part| !part.is_empty())
      .collect::<Vec<_>>()
      .join(" ")
  }

  /// Birthday rendered as `YYYY-MM-DD`.
  pub fn birthday_iso(&self) -> Option<String> {
    self.birthday.map(|d| d.format("%Y-%m-%d").to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_name_skips_missing_parts() {
    let mut s = Subject::new(Uuid::new_v4(), Utc::now());
    assert_eq!(s.full_name(), "");

    s.first_name = Some("Ada".into());
    assert_eq!(s.full_name(), "Ada");

    s.last_name = Some(" Lovelace ".into());
    assert_eq!(s.full_name(), "Ada Lovelace");

    s.first_name = Some("  ".into());
    assert_eq!(s.full_name(), "Lovelace");
  }

  #[test]
  fn birthday_is_iso_formatted() {
    let mut s = Subject::new(Uuid::new_v4(), Utc::now());
    s.birthday = NaiveDate::from_ymd_opt(1990, 3, 7);
    assert_eq!(s.birthday_iso().as_deref(), Some("1990-03-07"));
  }
}
