//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    /// Pull request not found
    #[error("Pull request {0} not found")]
    PrNotFound(String),

    /// Comment body over the platform limit
    #[error("Comment of {len} characters exceeds GitHub limit of {limit}")]
    CommentTooLarge { len: usize, limit: usize },

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::MissingEnv(err.to_string())
    }
}

impl From<Error> for quill_core::Error {
    fn from(err: Error) -> Self {
        use quill_core::Error as Core;

        match err {
            Error::Api(api) => classify_api(api),
            Error::Auth(msg) | Error::MissingEnv(msg) => Core::Fatal(msg),
            Error::PrNotFound(pr) => Core::Fatal(format!("pull request {} not found", pr)),
            Error::CommentTooLarge { len, limit } => Core::MessageTooLarge { len, limit },
            Error::Parse(msg) => Core::MalformedResponse(msg),
            Error::Other(msg) => Core::Publish(msg),
        }
    }
}

/// Map an octocrab failure onto the pipeline taxonomy
fn classify_api(err: octocrab::Error) -> quill_core::Error {
    use quill_core::Error as Core;

    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let message = source.message;
            let lower = message.to_ascii_lowercase();

            if is_too_large(status, &lower) {
                Core::PayloadTooLarge(format!("GitHub {}: {}", status, message))
            } else if status == 429 || (status == 403 && lower.contains("rate limit")) {
                Core::RateLimited { retry_after: None }
            } else if matches!(status, 401 | 403 | 404) {
                Core::Fatal(format!("GitHub {}: {}", status, message))
            } else if status >= 500 {
                Core::TransientUpstream(format!("GitHub {}: {}", status, message))
            } else {
                Core::Publish(format!("GitHub {}: {}", status, message))
            }
        }
        octocrab::Error::Serde { source, .. } => Core::MalformedResponse(source.to_string()),
        octocrab::Error::Json { source, .. } => Core::MalformedResponse(source.to_string()),
        // transport: connection resets, timeouts, TLS
        other => Core::TransientUpstream(other.to_string()),
    }
}

/// GitHub refuses to render diffs over its size limits with 406 or 422
fn is_too_large(status: u16, lower_message: &str) -> bool {
    status == 406
        || (status == 422
            && (lower_message.contains("too large") || lower_message.contains("exceeded")))
        || lower_message.contains("diff exceeded the maximum")
        || lower_message.contains("too_large")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_too_large() {
        assert!(is_too_large(406, "sorry, the diff exceeded the maximum number of files"));
        assert!(is_too_large(422, "diff is too large to render"));
        assert!(is_too_large(500, "server error: too_large"));
        assert!(!is_too_large(422, "validation failed"));
        assert!(!is_too_large(502, "bad gateway"));
    }

    #[test]
    fn test_local_errors_map_to_core() {
        let core: quill_core::Error = Error::Auth("no token".into()).into();
        assert!(core.is_fatal());

        let core: quill_core::Error = Error::CommentTooLarge { len: 70_000, limit: 65_536 }.into();
        assert!(matches!(
            core,
            quill_core::Error::MessageTooLarge { len: 70_000, limit: 65_536 }
        ));

        let core: quill_core::Error = Error::Parse("bad".into()).into();
        assert!(matches!(core, quill_core::Error::MalformedResponse(_)));
    }
}
