//! Pipeline wiring shared by the review and event commands

use std::sync::Arc;

use anyhow::Context as _;
use quill_core::{
    Collaborators, Config, HttpOracle, KvStore, MemoryStore, Pipeline, PipelineOutcome,
    Publisher, ReviewNotification, ReviewRequest,
};
use quill_db::{Database, DatabaseConfig, ReviewRun, RunStatus};
use quill_github::GitHubClient;
use tracing::{debug, warn};

use super::dry_run::StdoutPublisher;

/// A ready pipeline plus the database its runs are recorded in
pub struct PipelineContext {
    pipeline: Pipeline,
    db: Option<Arc<Database>>,
}

impl PipelineContext {
    /// Wire GitHub, the HTTP oracle and the local database into a pipeline
    ///
    /// A dry run prints instead of commenting and keeps its cache in memory,
    /// so it leaves no trace for later runs.
    pub async fn open(
        config: &Config,
        github: GitHubClient,
        dry_run: bool,
    ) -> anyhow::Result<Self> {
        let oracle = Arc::new(HttpOracle::from_env(config.oracle.clone())?);
        let github = Arc::new(github);

        let db = if dry_run {
            None
        } else {
            Some(Arc::new(open_database(config).await?))
        };
        let store: Arc<dyn KvStore> = match &db {
            Some(db) => db.clone(),
            None => Arc::new(MemoryStore::new()),
        };
        let publisher: Arc<dyn Publisher> = if dry_run {
            Arc::new(StdoutPublisher::new())
        } else {
            github.clone()
        };

        let pipeline = Pipeline::new(
            config,
            Collaborators {
                store,
                oracle,
                source: github,
                publisher,
            },
        );

        Ok(Self { pipeline, db })
    }

    /// Review an already validated request
    pub async fn review(&self, request: &ReviewRequest) -> PipelineOutcome {
        let outcome = self.pipeline.process(request).await;
        self.record(
            run_record(
                &request.target.to_string(),
                &request.revision,
                &request.event_id,
                &outcome,
            ),
        )
        .await;
        outcome
    }

    /// Validate and review a delivered notification
    pub async fn handle(&self, notification: ReviewNotification) -> PipelineOutcome {
        let target = format!(
            "{}#{}",
            notification.event.repository.full_name, notification.event.number
        );
        let revision = notification.event.pull_request.head.sha.clone();
        let event_id = notification.delivery_id.clone();

        let outcome = self.pipeline.handle(notification).await;
        self.record(run_record(&target, &revision, &event_id, &outcome))
            .await;
        outcome
    }

    async fn record(&self, run: ReviewRun) {
        let Some(db) = &self.db else {
            return;
        };
        match db.runs().insert(&run).await {
            Ok(id) => debug!(id, status = %run.status, "Recorded review run"),
            Err(e) => warn!(error = %e, "Failed to record review run"),
        }
    }
}

/// Open the configured database, or the default one
pub async fn open_database(config: &Config) -> anyhow::Result<Database> {
    let path = config
        .database
        .path
        .clone()
        .unwrap_or_else(DatabaseConfig::default_path);

    Database::open(DatabaseConfig::new(path.clone()))
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

/// History record for one pipeline outcome
pub fn run_record(
    target: &str,
    revision: &str,
    event_id: &str,
    outcome: &PipelineOutcome,
) -> ReviewRun {
    let mut run = ReviewRun::new(target, revision, event_id, run_status(outcome));
    run.mode = outcome.mode().map(str::to_string);
    run.verdict = outcome.verdict().map(|v| v.to_string());
    run.attempts = i64::from(outcome.attempts());
    run.last_error = outcome.last_error().map(str::to_string);
    run
}

fn run_status(outcome: &PipelineOutcome) -> RunStatus {
    match outcome {
        PipelineOutcome::Published { .. } => RunStatus::Published,
        PipelineOutcome::Cached { .. } => RunStatus::Cached,
        PipelineOutcome::Duplicate => RunStatus::Duplicate,
        PipelineOutcome::RateLimited { .. } => RunStatus::RateLimited,
        PipelineOutcome::Ignored(_) => RunStatus::Ignored,
        PipelineOutcome::Failed(_) => RunStatus::Failed,
    }
}

/// Print a one-line summary and fail the command if the run failed
pub fn report(outcome: &PipelineOutcome) -> anyhow::Result<()> {
    match outcome {
        PipelineOutcome::Published {
            artifact,
            mode,
            verdict,
            truncated,
            attempts,
        } => {
            println!(
                "Published review (comment {}): {} via {} analysis in {} attempt(s){}",
                artifact,
                verdict,
                mode,
                attempts,
                if *truncated { ", truncated" } else { "" }
            );
        }
        PipelineOutcome::Cached {
            artifact,
            republished,
            verdict,
        } => {
            let location = artifact
                .map(|id| format!("comment {}", id))
                .unwrap_or_else(|| "no comment".to_string());
            println!(
                "Revision already reviewed ({}): {}{}",
                location,
                verdict,
                if *republished { ", republished" } else { "" }
            );
        }
        PipelineOutcome::Duplicate => println!("Event already processed, skipped"),
        PipelineOutcome::RateLimited { count } => {
            println!("Rate limited: {} reviews in the current window", count)
        }
        PipelineOutcome::Ignored(reason) => println!("Ignored: {}", reason),
        PipelineOutcome::Failed(failure) => {
            anyhow::bail!(
                "Review of {} at {} failed after {} attempt(s): {}",
                failure.target,
                failure.revision,
                failure.attempts,
                failure.last_error
            );
        }
    }
    Ok(())
}
