//! CLI command definitions and handlers

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use console::{style, Emoji};
use dialoguer::{Input, Password};
use tracing::{error, info};

use keep_list_sync::config::{Config, KEYS};
use keep_list_sync::keep::{self, GoogleAuth, KeepClient, KeepList, SessionProvider, REMOTE_TIMEOUT};
use keep_list_sync::model::{epoch, Timestamp};
use keep_list_sync::reconcile::{import_remote, ImportReport, Reconciler, SyncOutcome, SyncReport};
use keep_list_sync::state::{FileWatermarkStore, TokenStore, WatermarkStore};
use keep_list_sync::store::{open_local, shopping_file};
use keep_list_sync::SyncError;

static CHECK: Emoji = Emoji("✓ ", "* ");
static CROSS: Emoji = Emoji("✗ ", "x ");
static ARROW: Emoji = Emoji("→ ", "-> ");
static INFO: Emoji = Emoji("ℹ ", "i ");

#[derive(Parser)]
#[command(name = "keep-list-sync")]
#[command(
    author,
    version,
    about = "Keep a cloud notes list and a home shopping list in sync"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding config.json and the state files
    #[arg(long, global = true, env = "CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile both lists once (default)
    Sync {
        /// Report the direction without changing anything
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Sync repeatedly until interrupted
    Watch {
        /// Seconds to wait between runs
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
    },

    /// Move every unchecked remote item into the local list
    Import,

    /// Show the last sync and the current local list
    Status,

    /// Log in and pick the remote list to sync with
    Setup {
        /// Title of the list note to use or create
        #[arg(short, long, default_value = "Groceries")]
        title: String,
    },

    /// Manage configuration
    Config {
        /// Configuration key
        key: Option<String>,

        /// Configuration value (omit to show current)
        value: Option<String>,
    },
}

fn failed(stage: &str, err: SyncError) -> anyhow::Error {
    anyhow!("{} failed during {}: {}", stage, err.phase(), err)
}

fn format_time(time: Timestamp) -> String {
    if time == epoch() {
        "never".to_string()
    } else {
        time.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string()
    }
}

async fn open_remote(config: &Config, config_dir: &Path) -> keep_list_sync::Result<KeepList> {
    let auth = GoogleAuth::new(config.android_id(), REMOTE_TIMEOUT)?;
    let tokens = TokenStore::new(config_dir);
    let session =
        keep::establish(&auth, &config.email, config.password.as_deref(), &tokens).await?;
    let client = KeepClient::new(&session, REMOTE_TIMEOUT)?;
    Ok(KeepList::new(client, config.note_id.clone()))
}

async fn sync_once(config_dir: &Path, dry_run: bool) -> keep_list_sync::Result<SyncReport> {
    let config = Config::load(config_dir)?;
    let mut local = open_local(&config)?;
    let mut remote = open_remote(&config, config_dir).await?;
    let mut watermarks = FileWatermarkStore::new(config_dir);

    Reconciler::new(&mut remote, local.as_mut(), &mut watermarks)
        .dry_run(dry_run)
        .run()
        .await
}

fn print_report(report: &SyncReport) {
    match report.outcome {
        SyncOutcome::NoOp => {
            println!("{} Nothing to sync.", INFO);
            return;
        }
        SyncOutcome::PushToLocal => println!("{} Updating local list from remote.", ARROW),
        SyncOutcome::PushToRemote => println!("{} Updating remote list from local.", ARROW),
    }

    if report.dry_run {
        println!("  {}", style("Dry run: nothing was changed").yellow());
        return;
    }

    println!(
        "{} {} added, {} removed",
        CHECK,
        style(report.added).green(),
        style(report.deleted).red()
    );
    if report.missing > 0 {
        println!(
            "  {} {} item(s) were already gone from the remote list",
            INFO, report.missing
        );
    }
}

/// One reconciliation run
pub async fn sync(config_dir: &Path, dry_run: bool) -> Result<()> {
    let report = sync_once(config_dir, dry_run)
        .await
        .map_err(|e| failed("sync", e))?;
    print_report(&report);
    Ok(())
}

/// Sequential runs with a fixed pause in between
pub async fn watch(config_dir: &Path, interval: u64) -> Result<()> {
    let pause = Duration::from_secs(interval.max(1));
    println!(
        "{} Syncing every {}s, press Ctrl-C to stop",
        INFO,
        style(pause.as_secs()).cyan()
    );

    loop {
        match sync_once(config_dir, false).await {
            Ok(report) => print_report(&report),
            Err(e) => error!("sync failed during {}: {}", e.phase(), e),
        }

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

async fn import_once(config_dir: &Path) -> keep_list_sync::Result<ImportReport> {
    let config = Config::load(config_dir)?;
    let mut local = open_local(&config)?;
    let mut remote = open_remote(&config, config_dir).await?;
    import_remote(&mut remote, local.as_mut()).await
}

/// Move remote items into the local list
pub async fn import(config_dir: &Path) -> Result<()> {
    println!("{} Importing remote items...", ARROW);
    let report = import_once(config_dir)
        .await
        .map_err(|e| failed("import", e))?;

    if report.imported == 0 && report.missing == 0 {
        println!("{} Remote list has no unchecked items", INFO);
    } else {
        println!(
            "{} Imported {} item(s)",
            CHECK,
            style(report.imported).green()
        );
    }
    if report.missing > 0 {
        println!("  {} {} item(s) were already gone", INFO, report.missing);
    }
    Ok(())
}

/// Show the stored watermark and the local list, offline
pub async fn status(config_dir: &Path) -> Result<()> {
    let config = Config::read(config_dir).context("Failed to read configuration")?;
    let watermark = FileWatermarkStore::new(config_dir)
        .load()
        .context("Failed to read sync state")?;

    println!("{}", style("Sync status:").bold());
    println!();
    println!(
        "  Remote list:  {}",
        style(if config.note_id.is_empty() {
            "(not set up)"
        } else {
            config.note_id.as_str()
        })
        .cyan()
    );
    println!(
        "  Last remote:  {}",
        format_time(watermark.remote_modified_at)
    );
    println!("  Last local:   {}", format_time(watermark.local_modified_at));
    println!("  Backend:      {}", config.local_backend);
    println!();

    if config.list_path.as_os_str().is_empty() {
        println!("  {} No local list configured", CROSS);
        return Ok(());
    }

    let snapshot = shopping_file::read_snapshot(&config.list_path)
        .await
        .map_err(|e| failed("status", e))?;

    if snapshot.modified_at != watermark.local_modified_at {
        println!(
            "  {} Local list changed since the last sync",
            style("!").yellow().bold()
        );
    }

    println!(
        "{} {}",
        style("Local list").bold(),
        style(config.list_path.display()).dim()
    );
    if snapshot.is_empty() {
        println!("  {}", style("(empty)").dim());
    } else {
        for line in snapshot.render().lines() {
            println!("  {}", line);
        }
    }

    Ok(())
}

/// Log in, find or create the list and store both in the config directory
pub async fn setup(config_dir: &Path, title: &str) -> Result<()> {
    let mut config = Config::read(config_dir).context("Failed to read configuration")?;

    if config.email.is_empty() {
        config.email = Input::<String>::new()
            .with_prompt("Account email")
            .interact_text()
            .context("Failed to read email")?;
    }
    config
        .validate_account()
        .map_err(|e| failed("setup", e))?;

    let password = match config.password.clone() {
        Some(password) => password,
        None => Password::new()
            .with_prompt(format!("Password for {}", config.email))
            .interact()
            .context("Failed to read password")?,
    };

    println!("{} Logging in as {}...", ARROW, style(&config.email).cyan());
    let auth = GoogleAuth::new(config.android_id(), REMOTE_TIMEOUT)?;
    let session = auth
        .login(&config.email, &password)
        .await
        .map_err(|e| failed("setup", e))?;
    TokenStore::new(config_dir)
        .save(session.current_token())
        .context("Failed to save token")?;

    let mut client = KeepClient::new(&session, REMOTE_TIMEOUT)?;
    client.refresh().await.map_err(|e| failed("setup", e))?;

    let note_id = match client.find_list_by_title(title) {
        Some(id) => {
            println!("{} Found list {}", CHECK, style(title).green());
            id
        }
        None => {
            let id = client.create_list(title);
            client.flush().await.map_err(|e| failed("setup", e))?;
            println!("{} Created list {}", CHECK, style(title).green());
            client.find_list_by_title(title).unwrap_or(id)
        }
    };

    config.note_id = note_id;
    config
        .save(config_dir)
        .context("Failed to save configuration")?;

    println!(
        "{} Saved configuration to {}",
        CHECK,
        style(Config::path(config_dir).display()).dim()
    );
    Ok(())
}

/// Show, get or set configuration values
pub fn manage_config(config_dir: &Path, key: Option<String>, value: Option<String>) -> Result<()> {
    let mut config = Config::read(config_dir).context("Failed to read configuration")?;

    match (key, value) {
        (None, _) => {
            println!("{}", style("Configuration:").bold());
            println!();
            for key in KEYS {
                println!("  {} = {}", style(key).cyan(), config.get(key)?);
            }
            println!();
            println!(
                "  Config file: {}",
                style(Config::path(config_dir).display()).dim()
            );
        }
        (Some(key), None) => {
            println!("{}", config.get(&key)?);
        }
        (Some(key), Some(value)) => {
            config.set(&key, &value)?;
            config
                .save(config_dir)
                .context("Failed to save configuration")?;
            println!(
                "{} Set {} = {}",
                CHECK,
                style(&key).cyan(),
                style(config.get(&key)?).green()
            );
        }
    }

    Ok(())
}
