//! Publishing review output and the update-vs-create decision

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::review::{FormattedOutput, TargetId};
use crate::{Error, Result};

/// Identifier of a published artifact (a comment id on the platform)
pub type ArtifactId = u64;

/// Marker identifying artifacts published by this tool
pub const TOOL_SIGNATURE: &str = "<!-- quill-review -->";

/// Publishing platform
///
/// Implementations must refuse, not truncate, any message longer than the
/// platform limit.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Most recent artifact on `target` carrying `signature`
    async fn find_existing(&self, target: &TargetId, signature: &str)
        -> Result<Option<ArtifactId>>;

    /// Publish the primary message
    async fn create(&self, target: &TargetId, output: &FormattedOutput) -> Result<ArtifactId>;

    /// Retire a previous artifact on `target` so it is no longer found as current
    async fn supersede(&self, target: &TargetId, artifact: ArtifactId) -> Result<()>;

    /// Publish one continuation message
    async fn create_continuation(&self, target: &TargetId, text: &str) -> Result<()>;
}

/// What to do about a previously published artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    /// Retire this artifact, then publish anew
    Supersede(ArtifactId),
    /// Publish without touching anything
    CreateNew,
}

/// Decides and performs publication
#[derive(Clone)]
pub struct ArtifactPublisher {
    publisher: Arc<dyn Publisher>,
    update_existing: bool,
    message_limit: usize,
}

impl ArtifactPublisher {
    pub fn new(publisher: Arc<dyn Publisher>, update_existing: bool, message_limit: usize) -> Self {
        Self {
            publisher,
            update_existing,
            message_limit,
        }
    }

    /// Current artifact of this tool on the target, if any
    pub async fn find_existing(&self, target: &TargetId) -> Result<Option<ArtifactId>> {
        self.publisher.find_existing(target, TOOL_SIGNATURE).await
    }

    /// Decision under the configured update policy
    pub fn policy(&self, existing: Option<ArtifactId>) -> PublishDecision {
        decision_for(existing, self.update_existing)
    }

    /// Supersede the current artifact when one exists and updates are enabled
    pub async fn decide(&self, target: &TargetId, revision: &str) -> Result<PublishDecision> {
        let existing = self.find_existing(target).await?;
        let decision = self.policy(existing);
        debug!(target = %target, revision, ?existing, ?decision, "Publish decision");
        Ok(decision)
    }

    /// Publish `output` following `decision`
    ///
    /// Every message is checked against the limit before anything is sent, so
    /// an oversized message never leaves a partial publication behind.
    pub async fn publish(
        &self,
        target: &TargetId,
        output: &FormattedOutput,
        decision: PublishDecision,
    ) -> Result<ArtifactId> {
        self.check_sizes(output)?;

        if let PublishDecision::Supersede(previous) = decision {
            self.publisher.supersede(target, previous).await?;
            info!(target = %target, artifact = previous, "Superseded previous review");
        }

        let artifact = self.publisher.create(target, output).await?;
        for text in &output.continuation_messages {
            if let Err(e) = self.publisher.create_continuation(target, text).await {
                self.retire_incomplete(target, artifact).await;
                return Err(e);
            }
        }

        info!(
            target = %target,
            artifact,
            continuations = output.continuation_messages.len(),
            truncated = output.truncated,
            "Published review"
        );
        Ok(artifact)
    }

    /// A primary message without all its continuations must not stay current
    async fn retire_incomplete(&self, target: &TargetId, artifact: ArtifactId) {
        match self.publisher.supersede(target, artifact).await {
            Ok(()) => warn!(target = %target, artifact, "Retired incomplete review"),
            Err(e) => warn!(
                target = %target,
                artifact,
                error = %e,
                "Failed to retire incomplete review"
            ),
        }
    }

    fn check_sizes(&self, output: &FormattedOutput) -> Result<()> {
        for message in output.messages() {
            let len = message.chars().count();
            if len > self.message_limit {
                return Err(Error::MessageTooLarge {
                    len,
                    limit: self.message_limit,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ArtifactPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactPublisher")
            .field("update_existing", &self.update_existing)
            .field("message_limit", &self.message_limit)
            .finish_non_exhaustive()
    }
}

/// Decision for an optional existing artifact under the update policy
pub fn decision_for(existing: Option<ArtifactId>, update_existing: bool) -> PublishDecision {
    match existing {
        Some(id) if update_existing => PublishDecision::Supersede(id),
        _ => PublishDecision::CreateNew,
    }
}
