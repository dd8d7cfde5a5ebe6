//! Tenant scope qualifiers.

use serde::{Deserialize, Serialize};

/// The tenant a query is restricted to. Either identifier may be absent;
/// blank strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
  pub business_id: Option<String>,
  pub brand_id:    Option<String>,
}

/// The identifier a membership lookup is keyed by. A business id wins over a
/// brand id when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
  Business(String),
  Brand(String),
}

impl Scope {
  pub fn new(business_id: Option<String>, brand_id: Option<String>) -> Self {
    Self {
      business_id: non_blank(business_id),
      brand_id:    non_blank(brand_id),
    }
  }

  pub fn business(id: impl Into<String>) -> Self {
    Self::new(Some(id.into()), None)
  }

  pub fn brand(id: impl Into<String>) -> Self { Self::new(None, Some(id.into())) }

  /// `true` when results must be restricted to subjects with a membership in
  /// this scope.
  pub fn is_required(&self) -> bool {
    self.business_id.is_some() || self.brand_id.is_some()
  }

  pub fn key(&self) -> Option<ScopeKey> {
    match (&self.business_id, &self.brand_id) {
      (Some(business), _) => Some(ScopeKey::Business(business.clone())),
      (None, Some(brand)) => Some(ScopeKey::Brand(brand.clone())),
      (None, None) => None,
    }
  }
}

impl ScopeKey {
  pub fn id(&self) -> &str {
    match self {
      ScopeKey::Business(id) | ScopeKey::Brand(id) => id,
    }
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn business_takes_precedence_over_brand() {
    let scope = Scope::new(Some("biz".into()), Some("brand".into()));
    assert_eq!(scope.key(), Some(ScopeKey::Business("biz".into())));

    let scope = Scope::brand("brand");
    assert_eq!(scope.key(), Some(ScopeKey::Brand("brand".into())));
  }

  #[test]
  fn blank_identifiers_are_absent() {
    let scope = Scope::new(Some("   ".into()), Some(String::new()));
    assert!(!scope.is_required());
    assert_eq!(scope.key(), None);
  }
}
