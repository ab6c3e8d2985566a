//! Quill CLI - Command line interface for the Quill review pipeline
//!
//! Reviews GitHub pull requests on demand or from delivered webhook events.

mod commands;

use clap::{Parser, Subcommand};
use quill_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{EventArgs, ReviewArgs, RunsArgs};

/// Quill: automated pull request review
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Oracle model (overrides config and env)
    #[arg(long, global = true, env = "QUILL_MODEL")]
    model: Option<String>,

    /// Units analyzed per batch (overrides config and env)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Review a pull request now
    #[command(visible_alias = "r")]
    Review(ReviewArgs),

    /// Process a delivered pull_request webhook body
    Event(EventArgs),

    /// Show recent review runs
    Runs(RunsArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(cli.model.clone(), cli.concurrency)?;

    if cli.verbose {
        tracing::info!(
            model = %config.oracle.model,
            concurrency = config.pipeline.concurrent_unit_reviews,
            max_monolithic_size = config.pipeline.max_monolithic_size,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("quill {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Review(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Event(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Runs(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Config) => {
            print_config(&config)?;
        }
        None => {
            println!("Quill - automated pull request review");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    println!("Quill Configuration");
    println!("===================");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
    Ok(())
}
