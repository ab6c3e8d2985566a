//! Unit analyzer: one oracle call per unit, classified into an outcome

use std::sync::Arc;

use tracing::{debug, warn};

use crate::oracle::{parse_response, Oracle, ParsedResponse};
use crate::retry::{Attempted, Exhausted, RetryPolicy};
use crate::review::{AnalysisUnit, Category, ReviewIssue, Severity, UnitOutcome, Verdict};
use crate::Error;

/// Message of the synthetic issue attached to an unparseable response
pub const PARSE_FAILURE_MESSAGE: &str =
    "The review response could not be interpreted; the raw text is kept for inspection.";

/// Sends units to the oracle through the backoff retrier
#[derive(Clone)]
pub struct UnitAnalyzer {
    oracle: Arc<dyn Oracle>,
    retry: RetryPolicy,
}

impl UnitAnalyzer {
    pub fn new(oracle: Arc<dyn Oracle>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Analyze one unit
    ///
    /// Transient and rate-limited failures are retried. On success the
    /// response text is interpreted; unparseable text becomes the neutral
    /// outcome. Any error left after retrying is returned to the caller,
    /// which decides between a path change, a skip or propagation.
    pub async fn analyze(&self, unit: &AnalysisUnit) -> Result<UnitOutcome, Exhausted> {
        let result = self
            .retry
            .retry_if(|| self.oracle.analyze(unit), Error::is_retryable)
            .await;

        let Attempted { value: raw, attempts } = match result {
            Ok(attempted) => attempted,
            Err(Exhausted {
                error: Error::MalformedResponse(reason),
                ..
            }) => {
                warn!(
                    unit = %unit.unit_id,
                    reason = %reason,
                    "Malformed oracle response, using neutral outcome"
                );
                return Ok(neutral_outcome(&unit.unit_id, String::new()));
            }
            Err(exhausted) => return Err(exhausted),
        };

        debug!(
            unit = %unit.unit_id,
            oracle = self.oracle.name(),
            attempts,
            response_len = raw.len(),
            "Oracle responded"
        );

        Ok(interpret(&unit.unit_id, raw))
    }
}

impl std::fmt::Debug for UnitAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitAnalyzer")
            .field("oracle", &self.oracle.name())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Turn raw oracle text into a unit outcome
pub fn interpret(unit_id: &str, raw: String) -> UnitOutcome {
    match parse_response(&raw) {
        ParsedResponse::Structured(r) | ParsedResponse::Narrative(r) => {
            UnitOutcome::success(unit_id, r.verdict, r.issues, r.summary, raw)
        }
        ParsedResponse::Unparseable(raw) => {
            warn!(
                unit = %unit_id,
                response_len = raw.len(),
                "Unparseable oracle response, using neutral outcome"
            );
            neutral_outcome(unit_id, raw)
        }
    }
}

/// `Comment` with a single synthetic issue noting the parse failure
fn neutral_outcome(unit_id: &str, raw: String) -> UnitOutcome {
    UnitOutcome::success(
        unit_id,
        Verdict::Comment,
        vec![ReviewIssue::new(
            Severity::Info,
            Category::Other,
            PARSE_FAILURE_MESSAGE,
        )],
        None,
        raw,
    )
}
