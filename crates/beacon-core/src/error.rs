//! Error types for `beacon-core`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("unknown dynamic placeholder: {0:?}")]
  UnknownPlaceholder(String),

  #[error("unsupported day offset in placeholder: {0}")]
  UnsupportedOffset(u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
