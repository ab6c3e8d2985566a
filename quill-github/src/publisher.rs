//! Pull request comments as the publishing platform

use async_trait::async_trait;
use octocrab::models::CommentId;
use quill_core::{ArtifactId, FormattedOutput, Publisher, TargetId};
use tracing::{debug, info};

use crate::{Error, GitHubClient, Result};

/// Maximum characters GitHub accepts in one comment body
pub const GITHUB_COMMENT_LIMIT: usize = 65_536;

/// Body left behind on a retired review, without the tool signature
pub const SUPERSEDED_BODY: &str =
    "<!-- quill-review:superseded -->\n*This review was superseded by a review of a newer revision.*";

#[async_trait]
impl Publisher for GitHubClient {
    async fn find_existing(
        &self,
        target: &TargetId,
        signature: &str,
    ) -> quill_core::Result<Option<ArtifactId>> {
        let first = self
            .client()
            .issues(&target.owner, &target.repo)
            .list_comments(target.number)
            .per_page(100)
            .send()
            .await
            .map_err(Error::Api)?;
        let comments = self.client().all_pages(first).await.map_err(Error::Api)?;

        let existing = latest_signed(
            comments
                .iter()
                .map(|c| (c.id.0, c.body.as_deref())),
            signature,
        );
        debug!(target = %target, scanned = comments.len(), ?existing, "Looked up previous review");
        Ok(existing)
    }

    async fn create(
        &self,
        target: &TargetId,
        output: &FormattedOutput,
    ) -> quill_core::Result<ArtifactId> {
        let id = self.post_comment(target, &output.primary_message).await?;
        Ok(id)
    }

    async fn supersede(&self, target: &TargetId, artifact: ArtifactId) -> quill_core::Result<()> {
        self.client()
            .issues(&target.owner, &target.repo)
            .update_comment(CommentId(artifact), SUPERSEDED_BODY)
            .await
            .map_err(Error::Api)?;

        info!(target = %target, comment = artifact, "Marked review comment as superseded");
        Ok(())
    }

    async fn create_continuation(&self, target: &TargetId, text: &str) -> quill_core::Result<()> {
        self.post_comment(target, text).await?;
        Ok(())
    }
}

impl GitHubClient {
    async fn post_comment(&self, target: &TargetId, body: &str) -> Result<ArtifactId> {
        check_length(body)?;

        let comment = self
            .client()
            .issues(&target.owner, &target.repo)
            .create_comment(target.number, body)
            .await?;

        let id = comment.id.0;
        debug!(target = %target, comment = id, chars = body.chars().count(), "Posted comment");
        Ok(id)
    }
}

/// Refuse bodies GitHub would reject
fn check_length(body: &str) -> Result<()> {
    let len = body.chars().count();
    if len > GITHUB_COMMENT_LIMIT {
        return Err(Error::CommentTooLarge {
            len,
            limit: GITHUB_COMMENT_LIMIT,
        });
    }
    Ok(())
}

/// Newest comment whose body carries `signature`
///
/// Comments are listed oldest first.
fn latest_signed<'a>(
    comments: impl Iterator<Item = (u64, Option<&'a str>)>,
    signature: &str,
) -> Option<ArtifactId> {
    comments
        .filter(|(_, body)| body.is_some_and(|b| b.contains(signature)))
        .map(|(id, _)| id)
        .last()
}
