//! Core types and trait definitions for the Beacon targeting engine.
//!
//! This crate has no HTTP or database dependencies. It holds
//! the subject and membership records, the targeting-rule evaluator, the query
//! request/response shapes, and the collaborator traits that storage backends
//! implement.

// Trait methods spell out `Send` futures; implementors use `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod membership;
pub mod query;
pub mod rule;
pub mod scope;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
