//! Quill GitHub - GitHub integration for Quill
//!
//! `GitHubClient` is both the change source (pull request diffs and changed
//! files) and the publisher (pull request comments) of the review pipeline.

mod client;
mod error;
mod pr;
mod publisher;
mod source;

pub use client::{parse_github_url, parse_pr_ref, GitHubClient, TOKEN_ENV};
pub use error::{Error, Result};
pub use pr::PullRequestInfo;
pub use publisher::{GITHUB_COMMENT_LIMIT, SUPERSEDED_BODY};
