//! Text-generation oracle: client trait, HTTP client and response parsing

mod breaker;
mod http;
pub mod parse;
mod prompt;

use async_trait::async_trait;

use crate::review::AnalysisUnit;
use crate::Result;

pub use breaker::{BreakerState, CircuitBreaker};
pub use http::HttpOracle;
pub use parse::{parse_response, ParsedResponse, UnitResponse};
pub use prompt::{build_prompt, SYSTEM_PROMPT};

/// External service producing review text for one unit
///
/// Implementations classify failures as `TransientUpstream`, `RateLimited`,
/// `PayloadTooLarge`, `MalformedResponse` or `Fatal`.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Analyze one unit's content in its context, returning the raw response text
    async fn analyze(&self, unit: &AnalysisUnit) -> Result<String>;
}
