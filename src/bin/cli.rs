//! Tandem CLI
//!
//! Drives the sync engine from the command line: one-shot sync, push,
//! pull, backup management, or the foreground watcher + poller service.

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tandem::config::{load_config, load_config_from, SyncConfig};
use tandem::service::SyncService;
use tandem::sync::{build_provider, SyncEngine};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Configuration store sync")]
#[command(version)]
struct Cli {
    /// Config file path (defaults to the platform config directory)
    #[arg(long, env = "TANDEM_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile local and remote state once
    Sync,
    /// Push the local store to the remote
    Push,
    /// Pull the remote store, overwriting local state (with backup)
    Pull,
    /// List retained backups, newest first
    Backups,
    /// Restore a named backup into the store directory
    Restore {
        /// Backup directory name as shown by `backups`
        name: String,
    },
    /// Run the watcher and poller in the foreground until interrupted
    Run,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            load_config_from(Path::new(&expanded))
                .with_context(|| format!("reading config from {}", expanded))
        }
        None => load_config().context("reading config from default location"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let provider = build_provider(&config)?;

    match cli.command {
        Commands::Sync => {
            let engine = SyncEngine::new(config, provider);
            println!("{}", engine.sync().await?);
        }
        Commands::Push => {
            let engine = SyncEngine::new(config, provider);
            println!("{}", engine.push_to_remote().await?);
        }
        Commands::Pull => {
            let engine = SyncEngine::new(config, provider);
            println!("{}", engine.pull_from_remote().await?);
        }
        Commands::Backups => {
            let engine = SyncEngine::new(config, provider);
            let backups = engine.backups().list_backups()?;
            if backups.is_empty() {
                println!("no backups");
            }
            for entry in backups {
                println!("{}", entry.name);
            }
        }
        Commands::Restore { name } => {
            let backup_path = config.backup_dir.join(&name);
            anyhow::ensure!(backup_path.exists(), "backup '{}' not found", name);
            let engine = SyncEngine::new(config.clone(), provider);
            // keep the overwritten state recoverable too
            if config.store_dir.join(tandem::store::STORE_DB).exists() {
                engine.backups().create_backup(&config.store_dir, "pre-restore")?;
            }
            engine
                .backups()
                .restore_backup(&backup_path, &config.store_dir)?;
            println!("restored {}", name);
        }
        Commands::Run => {
            let service = SyncService::start(config, provider)?;
            tracing::info!("tandem running, ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            service.stop().await;
        }
    }

    Ok(())
}
