//! Review command - review a pull request on demand

use chrono::Utc;
use clap::Args;
use quill_core::Config;
use quill_github::{parse_pr_ref, GitHubClient};

use super::context::{report, PipelineContext};

/// Arguments for the review command
#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Pull request: owner/repo#N or a pull request URL
    #[arg(required = true)]
    pub pr: String,

    /// Print the review instead of commenting
    #[arg(long)]
    pub dry_run: bool,

    /// Review drafts too
    #[arg(long)]
    pub include_draft: bool,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let target = parse_pr_ref(&self.pr)?;
        let github = GitHubClient::from_env()?;

        let info = github.get_pr(&target).await?;
        if info.draft && !self.include_draft {
            println!("Ignored: {} is a draft (use --include-draft to review it)", target);
            return Ok(());
        }

        tracing::info!(
            target = %target,
            head = %info.head_sha,
            dry_run = self.dry_run,
            "Starting review"
        );

        let event_id = format!("cli-{}", Utc::now().timestamp_millis());
        let request = info.into_request(target, event_id);

        let context = PipelineContext::open(config, github, self.dry_run).await?;
        let outcome = context.review(&request).await;
        report(&outcome)
    }
}
