//! Admission control: event deduplication and per-tenant rate limiting
//!
//! The dedup record is written before any processing starts. A crash after
//! admission therefore cannot cause the same event to be processed forever,
//! and a second delivery of the same event is rejected.
//!
//! The rate counter is incremented without cross-request locking. Concurrent
//! admissions for one tenant in the same window may over-admit by a small
//! margin.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::AdmissionConfig;
use crate::store::KvStore;
use crate::Result;

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed with the pipeline
    Admitted,
    /// Event was seen before
    Duplicate,
    /// Tenant exceeded its window ceiling
    RateLimited {
        /// Count observed after the increment
        count: u64,
    },
}

/// Deduplicating, rate-limiting gate in front of the pipeline
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<dyn KvStore>,
    config: AdmissionConfig,
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn KvStore>, config: AdmissionConfig) -> Self {
        Self { store, config }
    }

    /// Check an event at the current time
    pub async fn admit(&self, event_id: &str, tenant_id: &str) -> Result<Admission> {
        self.admit_at(event_id, tenant_id, Utc::now()).await
    }

    /// Check an event at an explicit instant
    pub async fn admit_at(
        &self,
        event_id: &str,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission> {
        let dedup_key = format!("dedup:{}", event_id);
        if self.store.get(&dedup_key).await?.is_some() {
            info!(event_id, tenant_id, "Duplicate event rejected");
            return Ok(Admission::Duplicate);
        }
        // Same key, same value: a racing duplicate writes an identical record
        self.store
            .put(&dedup_key, event_id, self.config.dedup_ttl)
            .await?;

        let window_id = self.window_id(now);
        let rate_key = format!("rate:{}:{}", tenant_id, window_id);
        let count = self
            .store
            .increment(&rate_key, self.config.window_size)
            .await?;

        if count > self.config.rate_limit_per_window {
            info!(
                event_id,
                tenant_id,
                count,
                limit = self.config.rate_limit_per_window,
                "Tenant rate limited"
            );
            return Ok(Admission::RateLimited { count });
        }

        debug!(event_id, tenant_id, count, window_id, "Event admitted");
        Ok(Admission::Admitted)
    }

    /// Fixed window index: `floor(now / window_size)`
    fn window_id(&self, now: DateTime<Utc>) -> i64 {
        let window_ms = i64::try_from(self.config.window_size.as_millis())
            .unwrap_or(i64::MAX)
            .max(1);
        now.timestamp_millis().div_euclid(window_ms)
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
