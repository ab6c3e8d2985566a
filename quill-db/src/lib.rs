//! Quill DB - SQLite persistence for the review pipeline
//!
//! Provides the TTL key/value table behind the idempotency cache, dedup
//! records and rate windows, and a history of review runs.

pub mod db;
pub mod error;
pub mod repos;

pub use db::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use repos::{KvRepository, ReviewRun, ReviewRunRepository, RunStatus};
