//! Error types for the review pipeline
//!
//! The variants mirror how a failure is handled, not where it came from:
//! transient and rate-limited failures are retried, payload-too-large changes
//! the analysis path, malformed responses are recovered locally and fatal
//! failures propagate immediately.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream service momentarily unavailable (timeout, 5xx, connection reset)
    #[error("Transient upstream failure: {0}")]
    TransientUpstream(String),

    /// Upstream or local rate limit hit
    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited {
        /// Delay suggested by the upstream, if any
        retry_after: Option<Duration>,
    },

    /// Request rejected because the payload is too large
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upstream answered with something that cannot be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Authentication or authorization failure
    #[error("Fatal: {0}")]
    Fatal(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Idempotency, dedup or rate-window store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Publishing collaborator failure
    #[error("Publish error: {0}")]
    Publish(String),

    /// A formatted message exceeded the platform limit
    #[error("Message of {len} characters exceeds platform limit of {limit}")]
    MessageTooLarge {
        /// Length of the offending message in characters
        len: usize,
        /// Configured platform limit
        limit: usize,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}ms)", d.as_millis()),
        None => String::new(),
    }
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientUpstream(_) | Error::RateLimited { .. })
    }

    /// Whether the upstream rejected the request because of its size
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, Error::PayloadTooLarge(_))
    }

    /// Whether the failure must propagate without any retry
    ///
    /// `MessageTooLarge` is a formatter bug, retrying would only repeat it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Fatal(_) | Error::Config(_) | Error::MessageTooLarge { .. }
        )
    }

    /// Retry hint carried by a rate-limited error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::TransientUpstream("timeout".into()).is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(!Error::PayloadTooLarge("413".into()).is_retryable());
        assert!(!Error::MalformedResponse("garbage".into()).is_retryable());
        assert!(!Error::Fatal("bad credentials".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Fatal("401".into()).is_fatal());
        assert!(Error::Config("zero concurrency".into()).is_fatal());
        assert!(Error::MessageTooLarge { len: 70000, limit: 65536 }.is_fatal());
        assert!(!Error::TransientUpstream("503".into()).is_fatal());
        assert!(!Error::PayloadTooLarge("413".into()).is_fatal());
    }

    #[test]
    fn test_rate_limited_display_includes_hint() {
        let err = Error::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.to_string(), "Rate limited (retry after 2000ms)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));

        let err = Error::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "Rate limited");
    }
}
