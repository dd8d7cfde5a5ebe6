//! Filter & search: narrows the enriched window.
//!
//! Predicates run in a fixed order, each over the survivors of the previous
//! one: targeting rules, free-text search, scope match, then the numeric and
//! temporal thresholds.

use beacon_core::{
  query::{EnrichedCandidate, TargetingQuery},
  rule::RuleSet,
};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Free-text search term in the two forms it is matched in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
  raw:    String,
  lower:  String,
  digits: String,
}

impl SearchTerm {
  pub fn new(term: &str) -> Self {
    Self {
      raw:    term.to_owned(),
      lower:  term.to_lowercase(),
      digits: digits_only(term),
    }
  }

  /// Name or email contain the term case-insensitively, or the phone contains
  /// it literally or digit-for-digit.
  pub fn matches(&self, candidate: &EnrichedCandidate) -> bool {
    let subject = &candidate.subject;

    if subject.full_name().to_lowercase().contains(&self.lower) {
      return true;
    }
    if subject
      .email
      .as_deref()
      .is_some_and(|e| e.to_lowercase().contains(&self.lower))
    {
      return true;
    }
    subject.phone.as_deref().is_some_and(|phone| {
      phone.contains(&self.raw)
        || (!self.digits.is_empty() && digits_only(phone).contains(&self.digits))
    })
  }
}

fn digits_only(s: &str) -> String { s.chars().filter(char::is_ascii_digit).collect() }

/// Every predicate of one request, resolved against its reference clock.
#[derive(Debug, Clone)]
pub struct Filters {
  pub rules:          RuleSet,
  pub search:         Option<SearchTerm>,
  pub scope_required: bool,
  pub min_stamps:     Option<i64>,
  pub coupons_only:   bool,
  /// Candidates whose last activity is before this instant are dropped.
  pub active_since:   Option<DateTime<Utc>>,
}

impl Filters {
  pub fn from_query(query: &TargetingQuery, now: DateTime<Utc>) -> Self {
    Self {
      rules:          RuleSet::prepare(&query.targeting_rules, now.date_naive()),
      search:         query.search_term().map(SearchTerm::new),
      scope_required: query.scope().is_required(),
      min_stamps:     query.filters.min_stamps(),
      coupons_only:   query.filters.coupons_only,
      active_since:   query
        .filters
        .last_visit_days()
        .map(|days| now - Duration::days(days)),
    }
  }

  pub fn apply(&self, candidates: Vec<EnrichedCandidate>) -> Vec<EnrichedCandidate> {
    let enriched = candidates.len();

    let mut out: Vec<EnrichedCandidate> = candidates
      .into_iter()
      .filter(|c| self.rules.matches(c))
      .collect();
    let after_rules = out.len();

    if let Some(search) = &self.search {
      out.retain(|c| search.matches(c));
    }
    let after_search = out.len();

    if self.scope_required {
      out.retain(|c| c.matches_scope);
    }
    let after_scope = out.len();

    out.retain(|c| self.passes_thresholds(c));

    debug!(
      enriched,
      after_rules,
      after_search,
      after_scope,
      remaining = out.len(),
      rules = self.rules.len(),
      "filtered candidates"
    );
    out
  }

  fn passes_thresholds(&self, c: &EnrichedCandidate) -> bool {
    if self.min_stamps.is_some_and(|min| c.valid_stamps() < min) {
      return false;
    }
    if self.coupons_only && c.valid_coupons() <= 0 {
      return false;
    }
    match self.active_since {
      Some(since) => c.last_activity_at().is_some_and(|at| at >= since),
      None => true,
    }
  }
}
