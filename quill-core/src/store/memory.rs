//! In-process store, used by tests and single-shot CLI runs without a database

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::KvStore;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// `KvStore` backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        drop_expired(&mut entries, Instant::now())
    }
}

/// Remove entries expired at `now`, returning how many were removed
fn drop_expired(entries: &mut HashMap<String, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.expires_at > now);
    before - entries.len()
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        drop_expired(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, window_ttl: Duration) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        drop_expired(&mut entries, now);

        let count = match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                let current: u64 = entry.value.parse().map_err(|_| {
                    Error::Store(format!("counter '{}' holds a non-numeric value", key))
                })?;
                entry.value = (current + 1).to_string();
                current + 1
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + window_ttl,
                    },
                );
                1
            }
        };

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.put("k", "v", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_resets_after_window() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.increment("c", ttl).await.unwrap(), 1);
        assert_eq!(store.increment("c", ttl).await.unwrap(), 2);
        assert_eq!(store.increment("c", ttl).await.unwrap(), 3);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.increment("c", ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() {
        let store = MemoryStore::new();
        for key in ["dedup:e1", "dedup:e2", "rate:t:1"] {
            store.put(key, "x", Duration::from_secs(10)).await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(11)).await;
        store.increment("rate:t:2", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.entries.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.put("short", "x", Duration::from_secs(5)).await.unwrap();
        store.put("long", "y", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.purge_expired().await, 0);
        assert_eq!(store.get("long").await.unwrap(), Some("y".to_string()));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric() {
        let store = MemoryStore::new();
        store.put("c", "abc", Duration::from_secs(60)).await.unwrap();
        assert!(matches!(
            store.increment("c", Duration::from_secs(60)).await,
            Err(Error::Store(_))
        ));
    }
}
