//! Error type for `beacon-engine`.
//!
//! Only failures that leave the pipeline without useful output surface here.
//! Per-subject enrichment and dispatch failures are logged and absorbed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// The candidate window could not be loaded.
  #[error("candidate load failed: {0}")]
  Load(#[source] Box<dyn std::error::Error + Send + Sync>),
}
