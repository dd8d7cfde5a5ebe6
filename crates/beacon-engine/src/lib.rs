//! The Beacon targeting pipeline.
//!
//! A query flows through the stages in order, each consuming the previous
//! stage's full output:
//!
//! 1. [`loader`] pulls an over-provisioned window of candidates.
//! 2. [`enrich`] attaches scoped membership counters.
//! 3. [`filter`] applies rules, free-text search, scope and thresholds.
//! 4. [`page`] sorts and slices the requested page.
//! 5. [`dispatch`] optionally increments a coupon counter for every subject
//!    on the page.
//!
//! [`TargetingEngine`] composes the stages; everything is generic over the
//! `beacon-core` store traits.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod loader;
pub mod page;
pub mod pool;
pub mod tenant_cache;

pub use config::EngineConfig;
pub use engine::TargetingEngine;
pub use error::EngineError;

#[cfg(test)]
mod fakes;
