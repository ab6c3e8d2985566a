//! GitHub API client using octocrab

use crate::{Error, Result};
use octocrab::Octocrab;
use quill_core::TargetId;
use tracing::{debug, info};

/// Environment variable holding the GitHub token
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// GitHub API client shared by the change source and the publisher
///
/// The client carries no repository of its own; every call names its
/// target, so one client serves events for any repository the token can see.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with `token`
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a client from the `GITHUB_TOKEN` environment variable
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::Auth(format!(
                    "GitHub token not found. Set the {} environment variable",
                    TOKEN_ENV
                ))
            })?;

        let client = Self::new(token)?;
        info!("Created GitHub client");
        Ok(client)
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }

    /// Test the connection by fetching the target's repository
    pub async fn test_connection(&self, owner: &str, repo: &str) -> Result<()> {
        debug!(owner, repo, "Testing GitHub connection");

        self.client.repos(owner, repo).get().await.map_err(|e| match e {
            octocrab::Error::GitHub { source, .. }
                if source.message.contains("Bad credentials") =>
            {
                Error::Auth("Invalid GitHub token".to_string())
            }
            other => Error::Api(other),
        })?;

        info!("GitHub connection successful");
        Ok(())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient").finish_non_exhaustive()
    }
}

/// Parse a pull request reference into a target
///
/// Supports formats:
/// - owner/repo#123
/// - https://github.com/owner/repo/pull/123
pub fn parse_pr_ref(reference: &str) -> Result<TargetId> {
    let reference = reference.trim();

    if reference.starts_with("https://") || reference.starts_with("http://") {
        let url = url::Url::parse(reference).map_err(|e| Error::Parse(e.to_string()))?;
        let parts: Vec<&str> = url
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();

        return match parts.as_slice() {
            [owner, repo, "pull", number, ..] => {
                Ok(TargetId::new(*owner, *repo, parse_number(number)?))
            }
            _ => Err(Error::Parse(format!(
                "Invalid pull request URL: {}. Expected https://github.com/owner/repo/pull/N",
                reference
            ))),
        };
    }

    let Some((repository, number)) = reference.split_once('#') else {
        return Err(Error::Parse(format!(
            "Invalid pull request reference: {}. Expected owner/repo#N",
            reference
        )));
    };

    let (owner, repo) = parse_github_url(repository)?;
    Ok(TargetId::new(owner, repo, parse_number(number)?))
}

fn parse_number(number: &str) -> Result<u64> {
    match number.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Parse(format!("Invalid pull request number: {}", number))),
    }
}

/// Parse a GitHub URL into owner and repo
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    // Handle shorthand: owner/repo
    if !url.contains(':') && !url.contains('/') {
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if !url.contains("://") && !url.contains('@') {
        let parts: Vec<&str> = url.split('/').collect();
        if let [owner, repo] = parts.as_slice() {
            if !owner.is_empty() && !repo.is_empty() {
                return Ok((owner.to_string(), repo.trim_end_matches(".git").to_string()));
            }
        }
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    // Handle HTTPS URL: https://github.com/owner/repo
    if url.starts_with("https://") || url.starts_with("http://") {
        let url = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        let path = url.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    // Handle SSH URL: git@github.com:owner/repo.git
    if url.starts_with("git@") {
        if let Some(path) = url.split(':').nth(1) {
            let path = path.trim_end_matches(".git");
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() >= 2 {
                return Ok((parts[0].to_string(), parts[1].to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", url)))
}
