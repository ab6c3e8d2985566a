//! Key/value storage behind the idempotency, dedup and rate-window records
//!
//! Stores are best-effort and at-least-once: every write made by the pipeline
//! is idempotent (same key, same value), so a repeated write after a retry is
//! harmless. `increment` is not required to be atomic across processes.

mod cache;
mod memory;
#[cfg(feature = "database")]
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use cache::{CacheEntry, IdempotencyStore};
pub use memory::MemoryStore;

/// TTL key/value store
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a live value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value that expires after `ttl`
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Increment a counter, creating it with `window_ttl` if absent or expired
    async fn increment(&self, key: &str, window_ttl: Duration) -> Result<u64>;
}
