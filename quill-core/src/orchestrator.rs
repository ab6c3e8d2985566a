//! Size-aware choice between monolithic and chunked analysis
//!
//! A change whose estimated size exceeds `max_monolithic_size` goes straight
//! to the chunked path. Otherwise the whole change is sent as one unit, and a
//! `PayloadTooLarge` rejection from the oracle switches to the chunked path.
//! Every other failure propagates unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::analyzer::UnitAnalyzer;
use crate::change::ChangeSource;
use crate::retry::Exhausted;
use crate::review::{AggregatedResult, AnalysisUnit, ContentRef, ReviewRequest};
use crate::scheduler::Scheduler;
use crate::{Error, Result};

/// Which path produced a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Monolithic,
    Chunked,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monolithic => "monolithic",
            Self::Chunked => "chunked",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated review plus the path taken
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub mode: AnalysisMode,
    pub result: AggregatedResult,
}

/// Drives one request through the monolithic or chunked path
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn ChangeSource>,
    analyzer: UnitAnalyzer,
    scheduler: Scheduler,
    aggregator: Aggregator,
    max_monolithic_size: usize,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        analyzer: UnitAnalyzer,
        concurrency: usize,
        aggregator: Aggregator,
        max_monolithic_size: usize,
    ) -> Self {
        Self {
            source,
            scheduler: Scheduler::new(analyzer.clone(), concurrency),
            analyzer,
            aggregator,
            max_monolithic_size,
        }
    }

    /// Review a request
    pub async fn run(&self, request: &ReviewRequest) -> Result<AnalysisReport> {
        let diff = match &request.content {
            ContentRef::Inline(diff) => diff.clone(),
            ContentRef::Remote => match self.source.get_whole_diff(&request.target).await {
                Ok(diff) => diff,
                Err(Error::PayloadTooLarge(reason)) => {
                    info!(
                        target = %request.target,
                        reason = %reason,
                        "Whole diff unavailable, using chunked analysis"
                    );
                    return self.run_chunked(request).await;
                }
                Err(e) => return Err(e),
            },
        };

        let estimated_size = estimated_size(&diff, request);
        if estimated_size > self.max_monolithic_size {
            info!(
                target = %request.target,
                estimated_size,
                max = self.max_monolithic_size,
                "Change too large for one call, using chunked analysis"
            );
            return self.run_chunked(request).await;
        }

        info!(target = %request.target, estimated_size, "Using monolithic analysis");
        let unit = AnalysisUnit::whole_change(diff, request.metadata.clone());
        match self.analyzer.analyze(&unit).await {
            Ok(outcome) => Ok(AnalysisReport {
                mode: AnalysisMode::Monolithic,
                result: self.aggregator.aggregate(&[outcome]),
            }),
            Err(Exhausted {
                error: Error::PayloadTooLarge(reason),
                ..
            }) => {
                warn!(
                    target = %request.target,
                    estimated_size,
                    reason = %reason,
                    "Oracle rejected whole change as too large, falling back to chunked analysis"
                );
                self.run_chunked(request).await
            }
            Err(Exhausted { error, .. }) => Err(error),
        }
    }

    async fn run_chunked(&self, request: &ReviewRequest) -> Result<AnalysisReport> {
        let changed = self.source.get_changed_units(&request.target).await?;
        let total = changed.len();

        let units: Vec<AnalysisUnit> = changed
            .into_iter()
            .filter(|c| !c.patch_text.trim().is_empty())
            .map(|c| AnalysisUnit::file(c.unit_id, c.patch_text, request.metadata.clone()))
            .collect();

        if units.len() < total {
            info!(
                target = %request.target,
                without_patch = total - units.len(),
                "Ignoring files without a patch"
            );
        }

        let outcomes = self.scheduler.run_all(&units).await?;
        Ok(AnalysisReport {
            mode: AnalysisMode::Chunked,
            result: self.aggregator.aggregate(&outcomes),
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scheduler", &self.scheduler)
            .field("max_monolithic_size", &self.max_monolithic_size)
            .finish_non_exhaustive()
    }
}

/// Diff length plus serialized context metadata, in bytes
pub fn estimated_size(diff: &str, request: &ReviewRequest) -> usize {
    diff.len() + request.metadata.serialized_len()
}
