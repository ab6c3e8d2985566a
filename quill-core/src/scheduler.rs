//! Concurrency-bounded fan-out of units to the analyzer
//!
//! Units are split into sequential batches of `concurrency`. All units of a
//! batch run concurrently and the whole batch settles before the next one
//! starts, which caps in-flight oracle calls without a worker pool.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::analyzer::UnitAnalyzer;
use crate::retry::Exhausted;
use crate::review::{AnalysisUnit, UnitOutcome};
use crate::{Error, Result};

/// Runs units through the analyzer in bounded batches
#[derive(Debug, Clone)]
pub struct Scheduler {
    analyzer: UnitAnalyzer,
    concurrency: usize,
}

impl Scheduler {
    pub fn new(analyzer: UnitAnalyzer, concurrency: usize) -> Self {
        Self {
            analyzer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Number of batches needed for `units`
    pub fn batch_count(&self, units: usize) -> usize {
        units.div_ceil(self.concurrency)
    }

    /// Analyze every unit, one outcome per unit in input order
    ///
    /// Individual unit failures become `Skipped` or `Failed` outcomes. Only a
    /// fatal error (bad credentials, invalid configuration) aborts the run;
    /// it is returned once the current batch has settled.
    pub async fn run_all(&self, units: &[AnalysisUnit]) -> Result<Vec<UnitOutcome>> {
        let batches = self.batch_count(units.len());
        info!(
            units = units.len(),
            concurrency = self.concurrency,
            batches,
            "Starting chunked analysis"
        );

        let mut outcomes = Vec::with_capacity(units.len());
        for (index, batch) in units.chunks(self.concurrency).enumerate() {
            debug!(batch = index + 1, of = batches, size = batch.len(), "Running batch");

            let settled = join_all(batch.iter().map(|unit| self.analyzer.analyze(unit))).await;

            let mut fatal = None;
            for (unit, result) in batch.iter().zip(settled) {
                match result {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(Exhausted { error, .. }) if error.is_fatal() => {
                        fatal.get_or_insert(error);
                    }
                    Err(exhausted) => outcomes.push(contain(unit, exhausted)),
                }
            }

            if let Some(error) = fatal {
                return Err(error);
            }
        }

        Ok(outcomes)
    }
}

/// Convert a unit's final error into a contained outcome
fn contain(unit: &AnalysisUnit, exhausted: Exhausted) -> UnitOutcome {
    let Exhausted { error, attempts } = exhausted;
    match error {
        Error::PayloadTooLarge(reason) => {
            warn!(
                unit = %unit.unit_id,
                reason = %reason,
                "Unit too large for the oracle, skipping"
            );
            UnitOutcome::skipped(&unit.unit_id, format!("too large to review: {}", reason))
        }
        error if error.is_retryable() => {
            warn!(
                unit = %unit.unit_id,
                attempts,
                error = %error,
                "Retries exhausted, skipping unit"
            );
            UnitOutcome::skipped(
                &unit.unit_id,
                format!("gave up after {} attempts: {}", attempts, error),
            )
        }
        error => {
            warn!(unit = %unit.unit_id, error = %error, "Unit failed");
            UnitOutcome::failed(&unit.unit_id, error.to_string())
        }
    }
}
