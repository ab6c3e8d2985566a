//! Change source: where diffs and per-file patches come from

use async_trait::async_trait;

use crate::review::{ChangedUnit, TargetId};
use crate::Result;

/// Supplies the content of a change
///
/// Both calls may fail with `Error::PayloadTooLarge` when the platform
/// refuses to render a change of that size.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Unified diff of the whole change
    async fn get_whole_diff(&self, target: &TargetId) -> Result<String>;

    /// Changed files with their patches
    async fn get_changed_units(&self, target: &TargetId) -> Result<Vec<ChangedUnit>>;
}
