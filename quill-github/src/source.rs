//! Pull request diffs as a change source

use async_trait::async_trait;
use octocrab::models::repos::DiffEntry;
use quill_core::{ChangeSource, ChangedUnit, TargetId};
use tracing::{debug, info};

use crate::{Error, GitHubClient};

#[async_trait]
impl ChangeSource for GitHubClient {
    async fn get_whole_diff(&self, target: &TargetId) -> quill_core::Result<String> {
        debug!(target = %target, "Fetching pull request diff");

        let diff = self
            .client()
            .pulls(&target.owner, &target.repo)
            .get_diff(target.number)
            .await
            .map_err(Error::Api)?;

        debug!(target = %target, bytes = diff.len(), "Fetched pull request diff");
        Ok(diff)
    }

    async fn get_changed_units(&self, target: &TargetId) -> quill_core::Result<Vec<ChangedUnit>> {
        debug!(target = %target, "Listing changed files");

        let first = self
            .client()
            .pulls(&target.owner, &target.repo)
            .list_files(target.number)
            .await
            .map_err(Error::Api)?;
        let entries = self.client().all_pages(first).await.map_err(Error::Api)?;

        let units: Vec<ChangedUnit> = entries.into_iter().map(changed_unit).collect();
        info!(target = %target, files = units.len(), "Listed changed files");
        Ok(units)
    }
}

/// Binary files and files over GitHub's patch limit come back without a patch
fn changed_unit(entry: DiffEntry) -> ChangedUnit {
    unit_from_parts(entry.filename, entry.patch, entry.additions, entry.deletions)
}

fn unit_from_parts(
    filename: String,
    patch: Option<String>,
    additions: u64,
    deletions: u64,
) -> ChangedUnit {
    ChangedUnit {
        unit_id: filename,
        patch_text: patch.unwrap_or_default(),
        added_count: additions,
        removed_count: deletions,
    }
}
