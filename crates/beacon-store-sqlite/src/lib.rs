//! SQLite backend for the Beacon targeting engine.
//!
//! Implements every collaborator trait of `beacon-core` (subjects,
//! memberships, tenant directory) on one database. Wraps [`tokio_rusqlite`] so
//! all database access runs on a dedicated thread without blocking the async
//! runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
