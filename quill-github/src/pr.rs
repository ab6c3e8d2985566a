//! Pull request lookup for on-demand reviews

use crate::{Error, GitHubClient, Result};
use octocrab::models::pulls::PullRequest as OctocrabPR;
use quill_core::review::ContextMetadata;
use quill_core::{ReviewRequest, TargetId};
use tracing::{debug, info};

/// Pull request fields needed to start a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// Head commit SHA
    pub head_sha: String,
    /// Whether the PR is a draft
    pub draft: bool,
    /// Title, author and branches
    pub metadata: ContextMetadata,
}

impl From<OctocrabPR> for PullRequestInfo {
    fn from(pr: OctocrabPR) -> Self {
        PullRequestInfo {
            head_sha: pr.head.sha,
            draft: pr.draft.unwrap_or(false),
            metadata: ContextMetadata {
                title: pr.title.unwrap_or_default(),
                author: pr.user.map(|u| u.login).unwrap_or_default(),
                base_branch: pr.base.ref_field,
                head_branch: pr.head.ref_field,
            },
        }
    }
}

impl PullRequestInfo {
    /// Review request for this pull request, attributed to `event_id`
    ///
    /// The tenant is the repository owner, as for events delivered without an
    /// installation.
    pub fn into_request(self, target: TargetId, event_id: impl Into<String>) -> ReviewRequest {
        let tenant = target.owner.clone();
        ReviewRequest::new(tenant, target, self.head_sha, event_id).with_metadata(self.metadata)
    }
}

impl GitHubClient {
    /// Get a pull request by target
    pub async fn get_pr(&self, target: &TargetId) -> Result<PullRequestInfo> {
        debug!(target = %target, "Fetching pull request");

        let pr = self
            .client()
            .pulls(&target.owner, &target.repo)
            .get(target.number)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::PrNotFound(target.to_string())
                }
                _ => Error::Api(e),
            })?;

        let info = PullRequestInfo::from(pr);
        info!(target = %target, head = %info.head_sha, draft = info.draft, "Fetched pull request");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_request_uses_owner_as_tenant() {
        let info = PullRequestInfo {
            head_sha: "abc123".into(),
            draft: false,
            metadata: ContextMetadata {
                title: "Add widgets".into(),
                author: "octocat".into(),
                base_branch: "main".into(),
                head_branch: "feature/widgets".into(),
            },
        };

        let request = info.into_request(TargetId::new("acme", "widgets", 7), "cli-1");
        assert_eq!(request.tenant_id, "acme");
        assert_eq!(request.revision, "abc123");
        assert_eq!(request.event_id, "cli-1");
        assert_eq!(request.metadata.author, "octocat");
        assert_eq!(request.cache_key(), "review:acme/widgets#7:abc123");
    }
}
