//! Quill Core - asynchronous review-processing pipeline
//!
//! This crate turns a "content changed" notification into a published,
//! size-bounded review. It deduplicates and rate-limits notifications,
//! chooses between one whole-change oracle call and a bounded per-file fan
//! out, retries a flaky oracle with backoff, aggregates unit results into
//! one verdict and splits the rendered output to fit the platform limit.
//!
//! The change source, oracle, publisher and key/value store are traits so
//! the pipeline can run against GitHub, an HTTP oracle and SQLite in
//! production, and against scripted fakes in tests.

pub mod admission;
pub mod aggregate;
pub mod analyzer;
pub mod change;
pub mod config;
pub mod error;
pub mod format;
pub mod oracle;
pub mod orchestrator;
pub mod pipeline;
pub mod publish;
pub mod retry;
pub mod review;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use admission::{Admission, AdmissionGate};
pub use aggregate::Aggregator;
pub use analyzer::UnitAnalyzer;
pub use change::ChangeSource;
pub use config::Config;
pub use error::{Error, Result};
pub use format::Formatter;
pub use oracle::{HttpOracle, Oracle};
pub use orchestrator::{AnalysisMode, AnalysisReport, Orchestrator};
pub use pipeline::{Collaborators, Pipeline, PipelineOutcome, RunFailure};
pub use publish::{ArtifactId, ArtifactPublisher, PublishDecision, Publisher, TOOL_SIGNATURE};
pub use retry::RetryPolicy;
pub use review::{
    AggregatedResult, AnalysisUnit, ChangedUnit, FormattedOutput, NotificationDecision,
    ReviewNotification, ReviewRequest, TargetId, UnitOutcome, Verdict,
};
pub use scheduler::Scheduler;
pub use store::{IdempotencyStore, KvStore, MemoryStore};
