//! Targeting rules and their evaluation.
//!
//! A rule is a `{field, operator, value}` triple. Values may be literals or
//! dynamic placeholders such as `${TODAY_MM_DD}`, which are resolved against a
//! reference date at evaluation time. Evaluation is pure: the same rules, the
//! same candidate and the same reference date always give the same answer.
//!
//! | Placeholder | Renders as |
//! |-------------|------------|
//! | `TODAY` | `YYYY-MM-DD` |
//! | `TODAY_MM_DD` | `MM-DD` |
//! | `TODAY_SUFFIX` | `-MM-DD` (tail of an ISO date) |
//! | `DAYS_AGO_<N>` | `YYYY-MM-DD`, `N` days before today |
//! | `DAYS_AGO_<N>_MM_DD` | `MM-DD`, `N` days before today |
//! | `DAYS_AGO_<N>_SUFFIX` | `-MM-DD`, `N` days before today |
//!
//! `N` is one of [`SUPPORTED_DAY_OFFSETS`]. Anything else passes through
//! unchanged.

use std::{cmp::Ordering, str::FromStr};

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, query::EnrichedCandidate};

/// The `database` tag carried by rules that target subject records.
pub const SUBJECT_DATABASE: &str = "users";

pub const SUPPORTED_DAY_OFFSETS: [u32; 3] = [7, 30, 40];

// ─── Rule ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
  #[serde(default = "default_database")]
  pub database: String,
  pub field:    String,
  pub operator: Operator,
  #[serde(default)]
  pub value:    Value,
}

fn default_database() -> String { SUBJECT_DATABASE.to_owned() }

impl TargetingRule {
  pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
    Self {
      database: default_database(),
      field: field.into(),
      operator,
      value,
    }
  }

  /// Whether this rule is evaluated against subject records at all.
  pub fn targets_subjects(&self) -> bool {
    self.database.eq_ignore_ascii_case(SUBJECT_DATABASE)
  }
}

// ─── Operators ───────────────────────────────────────────────────────────────

/// Comparison operators. Names the engine does not recognise, and operators
/// that are not strings at all, deserialise to [`Operator::Unknown`], which
/// never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Operator {
  Equals,
  NotEquals,
  Contains,
  NotContains,
  GreaterThan,
  LessThan,
  In,
  NotIn,
  Unknown(String),
}

type Comparator = fn(&Value, &Value) -> bool;

impl Operator {
  pub fn as_str(&self) -> &str {
    match self {
      Operator::Equals => "EQUALS",
      Operator::NotEquals => "NOT_EQUALS",
      Operator::Contains => "CONTAINS",
      Operator::NotContains => "NOT_CONTAINS",
      Operator::GreaterThan => "GREATER_THAN",
      Operator::LessThan => "LESS_THAN",
      Operator::In => "IN",
      Operator::NotIn => "NOT_IN",
      Operator::Unknown(name) => name,
    }
  }

  /// The comparison `(field_value, rule_value) -> bool` for this operator.
  pub fn comparator(&self) -> Comparator {
    match self {
      Operator::Equals => loosely_equal,
      Operator::NotEquals => not_equal,
      Operator::Contains => contains,
      Operator::NotContains => not_contains,
      Operator::GreaterThan => greater_than,
      Operator::LessThan => less_than,
      Operator::In => member_of,
      Operator::NotIn => not_member_of,
      Operator::Unknown(_) => never,
    }
  }
}

impl From<String> for Operator {
  fn from(name: String) -> Self {
    match name.trim().to_ascii_uppercase().as_str() {
      "EQUALS" => Operator::Equals,
      "NOT_EQUALS" => Operator::NotEquals,
      "CONTAINS" => Operator::Contains,
      "NOT_CONTAINS" => Operator::NotContains,
      "GREATER_THAN" => Operator::GreaterThan,
      "LESS_THAN" => Operator::LessThan,
      "IN" => Operator::In,
      "NOT_IN" => Operator::NotIn,
      _ => Operator::Unknown(name),
    }
  }
}

impl From<Operator> for String {
  fn from(op: Operator) -> Self { op.as_str().to_owned() }
}

impl<'de> Deserialize<'de> for Operator {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
      Value::String(name) => Operator::from(name),
      other => Operator::Unknown(other.to_string()),
    })
  }
}

/// Match a field value against an operator and rule value.
pub fn matches_operator(field_value: &Value, operator: &Operator, value: &Value) -> bool {
  operator.comparator()(field_value, value)
}

fn as_number(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn as_instant(v: &Value) -> Option<DateTime<Utc>> {
  let s = v.as_str()?.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
      return Some(naive.and_utc());
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
}

/// JSON equality, with `"5"` and `5` considered equal.
fn loosely_equal(a: &Value, b: &Value) -> bool {
  if a == b {
    return true;
  }
  match (as_number(a), as_number(b)) {
    (Some(x), Some(y)) => x == y,
    _ => false,
  }
}

fn not_equal(a: &Value, b: &Value) -> bool { !loosely_equal(a, b) }

/// `None` when either side is not a string.
fn substring(field: &Value, needle: &Value) -> Option<bool> {
  match (field, needle) {
    (Value::String(haystack), Value::String(needle)) => Some(haystack.contains(needle.as_str())),
    _ => None,
  }
}

fn contains(a: &Value, b: &Value) -> bool { substring(a, b).unwrap_or(false) }

fn not_contains(a: &Value, b: &Value) -> bool { substring(a, b) == Some(false) }

/// Instants first, then numbers.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  if let (Some(x), Some(y)) = (as_instant(a), as_instant(b)) {
    return Some(x.cmp(&y));
  }
  as_number(a)?.partial_cmp(&as_number(b)?)
}

fn greater_than(a: &Value, b: &Value) -> bool { compare(a, b) == Some(Ordering::Greater) }

fn less_than(a: &Value, b: &Value) -> bool { compare(a, b) == Some(Ordering::Less) }

/// `None` when the rule value is not an array.
fn membership(field: &Value, set: &Value) -> Option<bool> {
  let items = set.as_array()?;
  Some(items.iter().any(|item| loosely_equal(field, item)))
}

fn member_of(a: &Value, b: &Value) -> bool { membership(a, b).unwrap_or(false) }

fn not_member_of(a: &Value, b: &Value) -> bool { membership(a, b) == Some(false) }

fn never(_: &Value, _: &Value) -> bool { false }

// ─── Dynamic placeholders ────────────────────────────────────────────────────

/// How a resolved placeholder date is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
  /// `YYYY-MM-DD`
  FullDate,
  /// `MM-DD`
  MonthDay,
  /// `-MM-DD`
  MonthDaySuffix,
}

/// A recognised placeholder token: a date `days_ago` days before the
/// reference date, in a given format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicToken {
  pub days_ago: u32,
  pub format:   DateFormat,
}

impl DynamicToken {
  pub fn render(&self, today: NaiveDate) -> String {
    let date = today
      .checked_sub_days(Days::new(u64::from(self.days_ago)))
      .unwrap_or(today);
    let pattern = match self.format {
      DateFormat::FullDate => "%Y-%m-%d",
      DateFormat::MonthDay => "%m-%d",
      DateFormat::MonthDaySuffix => "-%m-%d",
    };
    date.format(pattern).to_string()
  }
}

impl FromStr for DynamicToken {
  type Err = Error;

  fn from_str(token: &str) -> Result<Self, Self::Err> {
    let unknown = || Error::UnknownPlaceholder(token.to_owned());

    let (days_ago, rest) = if let Some(rest) = token.strip_prefix("TODAY") {
      (0, rest)
    } else if let Some(rest) = token.strip_prefix("DAYS_AGO_") {
      let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
      let days: u32 = rest[..digits].parse().map_err(|_| unknown())?;
      if !SUPPORTED_DAY_OFFSETS.contains(&days) {
        return Err(Error::UnsupportedOffset(days));
      }
      (days, &rest[digits..])
    } else {
      return Err(unknown());
    };

    let format = match rest {
      "" => DateFormat::FullDate,
      "_MM_DD" => DateFormat::MonthDay,
      "_SUFFIX" => DateFormat::MonthDaySuffix,
      _ => return Err(unknown()),
    };
    Ok(DynamicToken { days_ago, format })
  }
}

/// Strip `${...}` or `{{...}}` from a placeholder string.
fn unwrap_placeholder(s: &str) -> &str {
  let s = s.trim();
  s.strip_prefix("${")
    .and_then(|inner| inner.strip_suffix('}'))
    .or_else(|| s.strip_prefix("{{").and_then(|inner| inner.strip_suffix("}}")))
    .map_or(s, str::trim)
}

/// Resolve a rule value against `today`. Non-strings and unrecognised tokens
/// are returned unchanged.
pub fn resolve_dynamic_value(value: &Value, today: NaiveDate) -> Value {
  let Value::String(raw) = value else {
    return value.clone();
  };
  match unwrap_placeholder(raw).parse::<DynamicToken>() {
    Ok(token) => Value::String(token.render(today)),
    Err(_) => value.clone(),
  }
}

// ─── Field lookup ────────────────────────────────────────────────────────────

/// Read the value a rule's `field` refers to. Unmapped names are looked up in
/// the subject's preferences; missing values are `null`.
pub fn pick_field(candidate: &EnrichedCandidate, field: &str) -> Value {
  let subject = &candidate.subject;
  let text = |v: &Option<String>| v.clone().map_or(Value::Null, Value::String);

  match field {
    "email" => text(&subject.email),
    "phone" => text(&subject.phone),
    "firstName" | "name" => text(&subject.first_name),
    "lastName" | "surname" => text(&subject.last_name),
    "birthday" => subject.birthday_iso().map_or(Value::Null, Value::String),
    "stamps" => Value::from(candidate.valid_stamps()),
    "tokens" => Value::from(candidate.token_balance()),
    other => subject.preferences.get(other).cloned().unwrap_or(Value::Null),
  }
}

// ─── Rule sets ───────────────────────────────────────────────────────────────

/// A rule whose value has been resolved for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRule {
  pub field:    String,
  pub operator: Operator,
  pub value:    Value,
}

impl ResolvedRule {
  pub fn matches(&self, candidate: &EnrichedCandidate) -> bool {
    matches_operator(&pick_field(candidate, &self.field), &self.operator, &self.value)
  }
}

/// The subject-domain rules of a request, resolved once against the request's
/// reference date so every candidate sees the same placeholder values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
  rules: Vec<ResolvedRule>,
}

impl RuleSet {
  pub fn prepare(rules: &[TargetingRule], today: NaiveDate) -> Self {
    let rules = rules
      .iter()
      .filter(|r| r.targets_subjects())
      .map(|r| ResolvedRule {
        field:    r.field.clone(),
        operator: r.operator.clone(),
        value:    resolve_dynamic_value(&r.value, today),
      })
      .collect();
    Self { rules }
  }

  pub fn len(&self) -> usize { self.rules.len() }

  pub fn is_empty(&self) -> bool { self.rules.is_empty() }

  /// Logical AND; an empty set matches everything.
  pub fn matches(&self, candidate: &EnrichedCandidate) -> bool {
    self.rules.iter().all(|rule| rule.matches(candidate))
  }
}

/// One-shot evaluation of `rules` against a single candidate. Batch callers
/// should [`RuleSet::prepare`] once instead.
pub fn evaluate_rules(rules: &[TargetingRule], candidate: &EnrichedCandidate, today: NaiveDate) -> bool {
  RuleSet::prepare(rules, today).matches(candidate)
}
