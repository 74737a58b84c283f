//! keep-list-sync - two-way sync between a Google Keep list and the
//! Home Assistant shopping list
//!
//! Meant to be run periodically (cron, a systemd timer or the `watch`
//! subcommand). Each run either does nothing, copies the remote list over the
//! local one, or rebuilds the remote list from the local one, depending on
//! which side changed last.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use keep_list_sync::config::config_dir;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is kept for the report
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_dir = config_dir(cli.config_dir)?;

    match cli.command.unwrap_or(Commands::Sync { dry_run: false }) {
        Commands::Sync { dry_run } => {
            cli::sync(&config_dir, dry_run).await?;
        }
        Commands::Watch { interval } => {
            cli::watch(&config_dir, interval).await?;
        }
        Commands::Import => {
            cli::import(&config_dir).await?;
        }
        Commands::Status => {
            cli::status(&config_dir).await?;
        }
        Commands::Setup { title } => {
            cli::setup(&config_dir, &title).await?;
        }
        Commands::Config { key, value } => {
            cli::manage_config(&config_dir, key, value)?;
        }
    }

    Ok(())
}
