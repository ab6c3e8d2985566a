//! Review requests and the units of work derived from them
//!
//! A `ReviewRequest` is created once per accepted notification and never
//! mutated afterwards. `(target, revision)` is the idempotency key.

use serde::{Deserialize, Serialize};

/// Identity of the reviewed target: a pull request in a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Pull request number
    pub number: u64,
}

impl TargetId {
    /// Create a new target identity
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// `owner/repo` without the pull request number
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Descriptive metadata sent to the oracle alongside every unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// Pull request title
    pub title: String,
    /// Author login
    pub author: String,
    /// Branch the change merges into
    pub base_branch: String,
    /// Branch carrying the change
    pub head_branch: String,
}

impl ContextMetadata {
    /// Serialized length used for payload size estimates
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Where the change content comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentRef {
    /// Diff text delivered with the notification
    Inline(String),
    /// Diff must be fetched from the change source
    Remote,
}

/// One unit of accepted work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Tenant the notification belongs to (installation or owner)
    pub tenant_id: String,
    /// Reviewed target
    pub target: TargetId,
    /// Content revision (head commit SHA)
    pub revision: String,
    /// Delivery id of the originating event
    pub event_id: String,
    /// Change content
    pub content: ContentRef,
    /// Context sent with every oracle call
    pub metadata: ContextMetadata,
}

impl ReviewRequest {
    /// Create a request whose content is fetched from the change source
    pub fn new(
        tenant_id: impl Into<String>,
        target: TargetId,
        revision: impl Into<String>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            target,
            revision: revision.into(),
            event_id: event_id.into(),
            content: ContentRef::Remote,
            metadata: ContextMetadata::default(),
        }
    }

    /// Attach context metadata
    pub fn with_metadata(mut self, metadata: ContextMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach inline diff content
    pub fn with_inline_content(mut self, diff: impl Into<String>) -> Self {
        self.content = ContentRef::Inline(diff.into());
        self
    }

    /// Idempotency key for this request
    pub fn cache_key(&self) -> String {
        format!("review:{}:{}", self.target, self.revision)
    }
}

/// Sentinel unit id for a whole-change analysis
pub const WHOLE_CHANGE_UNIT: &str = "<whole-change>";

/// The smallest piece of content sent to the oracle in one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisUnit {
    /// `WHOLE_CHANGE_UNIT` or a file path
    pub unit_id: String,
    /// Diff or patch text
    pub content: String,
    /// Context metadata of the parent request
    pub metadata: ContextMetadata,
}

impl AnalysisUnit {
    /// Unit covering the whole change
    pub fn whole_change(content: impl Into<String>, metadata: ContextMetadata) -> Self {
        Self {
            unit_id: WHOLE_CHANGE_UNIT.to_string(),
            content: content.into(),
            metadata,
        }
    }

    /// Unit covering a single file's patch
    pub fn file(
        path: impl Into<String>,
        patch: impl Into<String>,
        metadata: ContextMetadata,
    ) -> Self {
        Self {
            unit_id: path.into(),
            content: patch.into(),
            metadata,
        }
    }

    /// Whether this unit covers the whole change
    pub fn is_whole_change(&self) -> bool {
        self.unit_id == WHOLE_CHANGE_UNIT
    }
}

/// A changed file as reported by the change source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedUnit {
    /// File path
    pub unit_id: String,
    /// Unified patch text (empty for binary or oversized files)
    pub patch_text: String,
    /// Added line count
    pub added_count: u64,
    /// Removed line count
    pub removed_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        let target = TargetId::new("acme", "widgets", 42);
        assert_eq!(target.to_string(), "acme/widgets#42");
        assert_eq!(target.repository(), "acme/widgets");
    }

    #[test]
    fn test_cache_key_uses_target_and_revision() {
        let target = TargetId::new("acme", "widgets", 42);
        let request = ReviewRequest::new("acme", target.clone(), "abc123", "evt-1");
        assert_eq!(request.cache_key(), "review:acme/widgets#42:abc123");

        // a new event for the same revision shares the key
        let again = ReviewRequest::new("acme", target, "abc123", "evt-2");
        assert_eq!(request.cache_key(), again.cache_key());
    }

    #[test]
    fn test_whole_change_unit() {
        let unit = AnalysisUnit::whole_change("+ line", ContextMetadata::default());
        assert!(unit.is_whole_change());

        let unit = AnalysisUnit::file("src/lib.rs", "+ line", ContextMetadata::default());
        assert!(!unit.is_whole_change());
    }

    #[test]
    fn test_metadata_serialized_len() {
        let metadata = ContextMetadata {
            title: "Add login".to_string(),
            author: "octocat".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature/login".to_string(),
        };
        let expected = serde_json::to_string(&metadata).unwrap().len();
        assert_eq!(metadata.serialized_len(), expected);
    }
}
