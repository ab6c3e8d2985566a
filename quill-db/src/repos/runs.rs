//! Repository for review run history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{Error, Result};

/// How a pipeline invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Published,
    Cached,
    Duplicate,
    RateLimited,
    Ignored,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Published => "published",
            RunStatus::Cached => "cached",
            RunStatus::Duplicate => "duplicate",
            RunStatus::RateLimited => "rate_limited",
            RunStatus::Ignored => "ignored",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "published" => Ok(RunStatus::Published),
            "cached" => Ok(RunStatus::Cached),
            "duplicate" => Ok(RunStatus::Duplicate),
            "rate_limited" => Ok(RunStatus::RateLimited),
            "ignored" => Ok(RunStatus::Ignored),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::InvalidData(format!("unknown run status '{}'", other))),
        }
    }
}

/// Review run record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewRun {
    pub id: Option<i64>,
    pub target: String,
    pub revision: String,
    pub event_id: String,
    pub status: String,
    pub mode: Option<String>,
    pub verdict: Option<String>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewRun {
    /// Create a new record stamped with the current time
    pub fn new(
        target: impl Into<String>,
        revision: impl Into<String>,
        event_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            id: None,
            target: target.into(),
            revision: revision.into(),
            event_id: event_id.into(),
            status: status.as_str().to_string(),
            mode: None,
            verdict: None,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Parsed status
    pub fn run_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

/// Repository over the `review_runs` table
#[derive(Debug, Clone)]
pub struct ReviewRunRepository {
    pool: SqlitePool,
}

impl ReviewRunRepository {
    /// Create a new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a run record, returning its id
    pub async fn insert(&self, run: &ReviewRun) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO review_runs (
                target, revision, event_id, status, mode, verdict, attempts, last_error, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.target)
        .bind(&run.revision)
        .bind(&run.event_id)
        .bind(&run.status)
        .bind(&run.mode)
        .bind(&run.verdict)
        .bind(run.attempts)
        .bind(&run.last_error)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent runs first
    pub async fn recent(&self, limit: u32) -> Result<Vec<ReviewRun>> {
        let runs = sqlx::query_as::<_, ReviewRun>(
            "SELECT id, target, revision, event_id, status, mode, verdict, attempts, last_error, created_at
             FROM review_runs
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    /// Runs for one target, most recent first
    pub async fn find_by_target(&self, target: &str) -> Result<Vec<ReviewRun>> {
        let runs = sqlx::query_as::<_, ReviewRun>(
            "SELECT id, target, revision, event_id, status, mode, verdict, attempts, last_error, created_at
             FROM review_runs
             WHERE target = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }
}
