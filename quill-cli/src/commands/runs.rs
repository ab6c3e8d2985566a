//! Runs command - show recent review runs

use clap::Args;
use quill_core::Config;
use quill_db::ReviewRun;

use super::context::open_database;

/// Show recent review runs
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Number of runs to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: u32,

    /// Only runs for this target (owner/repo#N)
    #[arg(long)]
    pub target: Option<String>,
}

impl RunsArgs {
    /// Execute the runs command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let db = open_database(config).await?;
        let runs = match &self.target {
            Some(target) => db.runs().find_by_target(target).await?,
            None => db.runs().recent(self.limit).await?,
        };

        println!();
        if runs.is_empty() {
            println!("No review runs recorded.");
        } else {
            println!("Recent Review Runs:");
            println!();
            for run in runs.iter().take(self.limit as usize) {
                println!("  {}", format_run(run));
            }
        }
        println!();

        db.close().await;
        Ok(())
    }
}

fn format_run(run: &ReviewRun) -> String {
    let revision: String = run.revision.chars().take(7).collect();
    let mut line = format!(
        "{} {} @ {} [{}]",
        run.created_at.format("%Y-%m-%d %H:%M:%S"),
        run.target,
        revision,
        run.status
    );
    if let Some(mode) = &run.mode {
        line.push_str(&format!(" mode={}", mode));
    }
    if let Some(verdict) = &run.verdict {
        line.push_str(&format!(" verdict=\"{}\"", verdict));
    }
    if run.attempts > 1 {
        line.push_str(&format!(" attempts={}", run.attempts));
    }
    if let Some(error) = &run.last_error {
        line.push_str(&format!(" error=\"{}\"", error));
    }
    line
}
