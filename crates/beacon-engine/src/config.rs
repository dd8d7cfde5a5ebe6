//! Engine tuning knobs.

use std::time::Duration;

use serde::Deserialize;

/// Runtime configuration for [`TargetingEngine`](crate::TargetingEngine),
/// usually deserialised from the `[engine]` table of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on the candidate window requested from the subject store.
  pub max_take:              usize,
  /// Workers used for per-subject membership reads when bulk lookup is
  /// unavailable.
  pub enrich_concurrency:    usize,
  /// Workers used for coupon dispatch.
  pub dispatch_concurrency:  usize,
  /// How long a brand → business mapping is cached.
  pub tenant_cache_ttl_secs: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_take:              1000,
      enrich_concurrency:    8,
      dispatch_concurrency:  12,
      tenant_cache_ttl_secs: 300,
    }
  }
}

impl EngineConfig {
  pub fn tenant_cache_ttl(&self) -> Duration {
    Duration::from_secs(self.tenant_cache_ttl_secs)
  }
}
