//! End-to-end review pipeline
//!
//! notification → admission → idempotency lookup → orchestrator →
//! aggregator → formatter → publish decision → publish → idempotency write
//!
//! Everything after admission runs under the pipeline retrier. Admission
//! stays outside of it: the dedup record written on the first attempt would
//! otherwise reject every retry as a duplicate.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::admission::{Admission, AdmissionGate};
use crate::aggregate::Aggregator;
use crate::analyzer::UnitAnalyzer;
use crate::change::ChangeSource;
use crate::config::Config;
use crate::format::Formatter;
use crate::oracle::Oracle;
use crate::orchestrator::{AnalysisMode, Orchestrator};
use crate::publish::{ArtifactId, ArtifactPublisher, Publisher};
use crate::retry::{Attempted, Exhausted, RetryPolicy};
use crate::review::{NotificationDecision, ReviewNotification, ReviewRequest, TargetId, Verdict};
use crate::store::{CacheEntry, IdempotencyStore, KvStore};
use crate::Result;

/// External collaborators a pipeline is built from
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KvStore>,
    pub oracle: Arc<dyn Oracle>,
    pub source: Arc<dyn ChangeSource>,
    pub publisher: Arc<dyn Publisher>,
}

/// Context of a run that ended without publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub target: TargetId,
    pub revision: String,
    pub attempts: u32,
    pub last_error: String,
}

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// A new review was published
    Published {
        artifact: ArtifactId,
        mode: AnalysisMode,
        verdict: Verdict,
        truncated: bool,
        attempts: u32,
    },
    /// The revision was already reviewed
    Cached {
        /// Artifact holding the cached review
        artifact: Option<ArtifactId>,
        /// Whether the cached output had to be published again
        republished: bool,
        verdict: Verdict,
    },
    /// Event was delivered before
    Duplicate,
    /// Tenant exceeded its admission ceiling
    RateLimited { count: u64 },
    /// Notification needs no review
    Ignored(String),
    /// Retries exhausted or a fatal error, nothing published
    Failed(RunFailure),
}

impl PipelineOutcome {
    /// Lowercase status label used in run records
    pub fn status(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Cached { .. } => "cached",
            Self::Duplicate => "duplicate",
            Self::RateLimited { .. } => "rate_limited",
            Self::Ignored(_) => "ignored",
            Self::Failed(_) => "failed",
        }
    }

    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Self::Published { verdict, .. } | Self::Cached { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }

    /// Analysis path label, `cached` for cache hits
    pub fn mode(&self) -> Option<&'static str> {
        match self {
            Self::Published { mode, .. } => Some(mode.as_str()),
            Self::Cached { .. } => Some("cached"),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Published { attempts, .. } => *attempts,
            Self::Failed(failure) => failure.attempts,
            Self::Cached { .. } => 1,
            _ => 0,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            Self::Failed(failure) => Some(&failure.last_error),
            _ => None,
        }
    }
}

/// Result of one attempt past admission
enum RunResult {
    Published {
        artifact: ArtifactId,
        mode: AnalysisMode,
        verdict: Verdict,
        truncated: bool,
    },
    Cached {
        artifact: Option<ArtifactId>,
        republished: bool,
        verdict: Verdict,
    },
}

/// The review pipeline
pub struct Pipeline {
    gate: AdmissionGate,
    cache: IdempotencyStore,
    orchestrator: Orchestrator,
    formatter: Formatter,
    publisher: ArtifactPublisher,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let analyzer = UnitAnalyzer::new(collaborators.oracle, retry);

        Self {
            gate: AdmissionGate::new(collaborators.store.clone(), config.admission.clone()),
            cache: IdempotencyStore::new(collaborators.store, config.cache.ttl),
            orchestrator: Orchestrator::new(
                collaborators.source,
                analyzer,
                config.pipeline.concurrent_unit_reviews,
                Aggregator::new(config.pipeline.skip_tolerance),
                config.pipeline.max_monolithic_size,
            ),
            formatter: Formatter::new(config.output.clone()),
            publisher: ArtifactPublisher::new(
                collaborators.publisher,
                config.pipeline.update_existing_results,
                config.output.platform_message_limit,
            ),
            retry,
        }
    }

    /// Validate a notification and review it
    pub async fn handle(&self, notification: ReviewNotification) -> PipelineOutcome {
        let delivery_id = notification.delivery_id.clone();
        match notification.validate() {
            NotificationDecision::Accept(request) => self.process(&request).await,
            NotificationDecision::Ignore(reason) => {
                info!(delivery_id = %delivery_id, reason = %reason, "Notification ignored");
                PipelineOutcome::Ignored(reason)
            }
        }
    }

    /// Admit and review a request
    pub async fn process(&self, request: &ReviewRequest) -> PipelineOutcome {
        match self.gate.admit(&request.event_id, &request.tenant_id).await {
            Ok(Admission::Admitted) => {}
            Ok(Admission::Duplicate) => return PipelineOutcome::Duplicate,
            Ok(Admission::RateLimited { count }) => return PipelineOutcome::RateLimited { count },
            Err(e) => {
                return self.failed(
                    request,
                    Exhausted {
                        error: e,
                        attempts: 0,
                    },
                )
            }
        }

        info!(
            target = %request.target,
            revision = %request.revision,
            event_id = %request.event_id,
            "Review admitted"
        );

        let run = self
            .retry
            .retry_if(|| self.run_once(request), |e| !e.is_fatal())
            .await;

        match run {
            Ok(Attempted {
                value:
                    RunResult::Published {
                        artifact,
                        mode,
                        verdict,
                        truncated,
                    },
                attempts,
            }) => PipelineOutcome::Published {
                artifact,
                mode,
                verdict,
                truncated,
                attempts,
            },
            Ok(Attempted {
                value:
                    RunResult::Cached {
                        artifact,
                        republished,
                        verdict,
                    },
                ..
            }) => PipelineOutcome::Cached {
                artifact,
                republished,
                verdict,
            },
            Err(exhausted) => self.failed(request, exhausted),
        }
    }

    fn failed(&self, request: &ReviewRequest, exhausted: Exhausted) -> PipelineOutcome {
        error!(
            target = %request.target,
            revision = %request.revision,
            attempts = exhausted.attempts,
            error = %exhausted.error,
            "Review run failed, nothing published"
        );
        PipelineOutcome::Failed(RunFailure {
            target: request.target.clone(),
            revision: request.revision.clone(),
            attempts: exhausted.attempts,
            last_error: exhausted.error.to_string(),
        })
    }

    async fn run_once(&self, request: &ReviewRequest) -> Result<RunResult> {
        if let Some(entry) = self.cache.get(request).await? {
            return self.replay(request, entry).await;
        }

        let report = self.orchestrator.run(request).await?;
        let output = self.formatter.format(&report.result);

        let decision = self
            .publisher
            .decide(&request.target, &request.revision)
            .await?;
        let artifact = self
            .publisher
            .publish(&request.target, &output, decision)
            .await?;

        let verdict = report.result.overall_verdict;
        let truncated = output.truncated;
        let entry = CacheEntry {
            target: request.target.clone(),
            revision: request.revision.clone(),
            result: report.result,
            output,
            published_artifact_id: Some(artifact),
            created_at: Utc::now(),
            ttl: self.cache.ttl(),
        };
        // Already published: a retry would only publish again
        if let Err(e) = self.cache.put(request, &entry).await {
            warn!(
                target = %request.target,
                error = %e,
                "Failed to record review in idempotency store"
            );
        }

        Ok(RunResult::Published {
            artifact,
            mode: report.mode,
            verdict,
            truncated,
        })
    }

    /// Serve a cached review, publishing it again only if its artifact is gone
    async fn replay(&self, request: &ReviewRequest, mut entry: CacheEntry) -> Result<RunResult> {
        let verdict = entry.result.overall_verdict;
        let existing = self.publisher.find_existing(&request.target).await?;

        if existing.is_some() && existing == entry.published_artifact_id {
            info!(
                target = %request.target,
                revision = %request.revision,
                "Revision already reviewed, nothing to do"
            );
            return Ok(RunResult::Cached {
                artifact: existing,
                republished: false,
                verdict,
            });
        }

        info!(
            target = %request.target,
            revision = %request.revision,
            ?existing,
            "Republishing cached review"
        );
        let decision = self.publisher.policy(existing);
        let artifact = self
            .publisher
            .publish(&request.target, &entry.output, decision)
            .await?;

        entry.published_artifact_id = Some(artifact);
        if let Err(e) = self.cache.put(request, &entry).await {
            warn!(target = %request.target, error = %e, "Failed to update idempotency store");
        }

        Ok(RunResult::Cached {
            artifact: Some(artifact),
            republished: true,
            verdict,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("gate", &self.gate)
            .field("orchestrator", &self.orchestrator)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
