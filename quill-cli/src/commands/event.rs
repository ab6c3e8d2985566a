//! Event command - process a delivered webhook body

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use quill_core::{Config, ReviewNotification};
use quill_github::GitHubClient;

use super::context::{report, PipelineContext};

/// Arguments for the event command
#[derive(Args, Debug)]
pub struct EventArgs {
    /// File holding the pull_request event JSON, `-` for stdin
    #[arg(required = true)]
    pub file: PathBuf,

    /// Delivery id of the event (X-GitHub-Delivery)
    #[arg(long, env = "GITHUB_DELIVERY")]
    pub delivery_id: String,

    /// Print the review instead of commenting
    #[arg(long)]
    pub dry_run: bool,
}

impl EventArgs {
    /// Execute the event command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let body = self.read_body()?;
        let notification = ReviewNotification::from_json(&self.delivery_id, &body)
            .context("Failed to parse pull_request event")?;

        tracing::info!(
            delivery_id = %self.delivery_id,
            action = %notification.event.action,
            repository = %notification.event.repository.full_name,
            number = notification.event.number,
            "Received event"
        );

        let github = GitHubClient::from_env()?;
        let context = PipelineContext::open(config, github, self.dry_run).await?;
        let outcome = context.handle(notification).await;
        report(&outcome)
    }

    fn read_body(&self) -> anyhow::Result<String> {
        if self.file.as_os_str() == "-" {
            return Ok(std::io::read_to_string(std::io::stdin())?);
        }
        std::fs::read_to_string(&self.file)
            .with_context(|| format!("Failed to read {}", self.file.display()))
    }
}
