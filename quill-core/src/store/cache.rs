//! Idempotency cache keyed by `(target, revision)`
//!
//! An entry is written only after a run has fully completed and published,
//! so an interrupted run leaves nothing behind and is simply redone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::KvStore;
use crate::publish::ArtifactId;
use crate::review::{AggregatedResult, FormattedOutput, ReviewRequest, TargetId};
use crate::Result;

/// A completed review, reusable for the same revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub target: TargetId,
    pub revision: String,
    pub result: AggregatedResult,
    pub output: FormattedOutput,
    pub published_artifact_id: Option<ArtifactId>,
    pub created_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

/// Typed view over a `KvStore` for cache entries
#[derive(Clone)]
pub struct IdempotencyStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Configured entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a completed review for this request's revision
    ///
    /// An entry that no longer deserializes is treated as a miss.
    pub async fn get(&self, request: &ReviewRequest) -> Result<Option<CacheEntry>> {
        let key = request.cache_key();
        let Some(raw) = self.store.get(&key).await? else {
            debug!(key = %key, "Idempotency cache miss");
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                debug!(key = %key, "Idempotency cache hit");
                Ok(Some(entry))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Store a completed review
    pub async fn put(&self, request: &ReviewRequest, entry: &CacheEntry) -> Result<()> {
        let value = serde_json::to_string(entry)?;
        self.store.put(&request.cache_key(), &value, self.ttl).await
    }
}

impl std::fmt::Debug for IdempotencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::{IssueCounts, Verdict};
    use crate::store::MemoryStore;

    fn sample_entry(request: &ReviewRequest) -> CacheEntry {
        CacheEntry {
            target: request.target.clone(),
            revision: request.revision.clone(),
            result: AggregatedResult {
                overall_verdict: Verdict::Approve,
                confidence: 0.9,
                issue_counts: IssueCounts::default(),
                skipped_units: 0,
                per_unit_summary: Vec::new(),
                prioritized_issues: Vec::new(),
                narrative_text: "Looks good".to_string(),
            },
            output: FormattedOutput {
                primary_message: "body".to_string(),
                continuation_messages: Vec::new(),
                truncated: false,
            },
            published_artifact_id: Some(12),
            created_at: Utc::now(),
            ttl: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_store() {
        let store = Arc::new(MemoryStore::new());
        let cache = IdempotencyStore::new(store, Duration::from_secs(3600));
        let request = ReviewRequest::new("t", TargetId::new("acme", "widgets", 1), "sha1", "e1");

        assert!(cache.get(&request).await.unwrap().is_none());

        let entry = sample_entry(&request);
        cache.put(&request, &entry).await.unwrap();
        assert_eq!(cache.get(&request).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_other_revision_misses() {
        let store = Arc::new(MemoryStore::new());
        let cache = IdempotencyStore::new(store, Duration::from_secs(3600));
        let request = ReviewRequest::new("t", TargetId::new("acme", "widgets", 1), "sha1", "e1");
        cache.put(&request, &sample_entry(&request)).await.unwrap();

        let newer = ReviewRequest::new("t", TargetId::new("acme", "widgets", 1), "sha2", "e2");
        assert!(cache.get(&newer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let request = ReviewRequest::new("t", TargetId::new("acme", "widgets", 1), "sha1", "e1");
        store
            .put(&request.cache_key(), "{ not an entry", Duration::from_secs(60))
            .await
            .unwrap();

        let cache = IdempotencyStore::new(store, Duration::from_secs(3600));
        assert!(cache.get(&request).await.unwrap().is_none());
    }
}
