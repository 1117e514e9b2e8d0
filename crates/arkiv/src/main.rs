// SPDX-FileCopyrightText: 2026 Arkiv Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arkiv - a durable chat-message archival engine.
//!
//! This is the binary entry point. `arkiv serve` runs the engine until
//! terminated; the remaining subcommands are one-shot operations against
//! the configured store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

mod admin;
mod serve;
mod status;

/// Arkiv - a durable chat-message archival engine.
#[derive(Parser, Debug)]
#[command(name = "arkiv", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (skips the XDG hierarchy lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the archival engine until terminated.
    Serve,
    /// Show archiver state from the health endpoint.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Snapshot the store into the backup directory now.
    Backup,
    /// List backup artifacts, newest first.
    Backups,
    /// Restore the store from a named backup artifact.
    Restore {
        /// Artifact name as printed by `arkiv backups`.
        name: String,
    },
    /// Run one retention cleanup pass now.
    Cleanup,
    /// Print archive statistics.
    Stats,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => arkiv_config::load_config_from_path(path),
        None => arkiv_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.archiver.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Status { json, plain } => status::run_status(&config, json, plain).await,
        Commands::Backup => admin::run_backup(&config).await,
        Commands::Backups => admin::run_backups(&config).await,
        Commands::Restore { name } => admin::run_restore(&config, &name).await,
        Commands::Cleanup => admin::run_cleanup(&config).await,
        Commands::Stats => admin::run_stats(&config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,arkiv={log_level},arkiv_core={log_level},arkiv_config={log_level},\
             arkiv_store={log_level},arkiv_engine={log_level},arkiv_health={log_level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
