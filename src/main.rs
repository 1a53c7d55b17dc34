mod commands;
mod render;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use calshare_core::{CalShareConfig, CalShareResult, ExpirationSweeper, Stores, SweepReport};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "calshare")]
#[command(about = "Turn event drafts into a shareable calendar file")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a draft file to fill in
    New {
        path: PathBuf,

        /// Number of placeholder events
        #[arg(short = 'n', long, default_value_t = 1)]
        events: usize,

        /// Name of the generated calendar file
        #[arg(short, long)]
        file_name: Option<String>,
    },
    /// Print the calendar file a draft file would produce
    Preview {
        path: PathBuf,

        /// List the next N starts of each recurring event instead
        #[arg(short, long)]
        occurrences: Option<u16>,
    },
    /// Generate the calendar file, keep a local copy and upload it for sharing
    Generate { path: PathBuf },
    /// List generated files, newest first
    History,
    /// Show the events in a generated file (id or id prefix)
    Show { id: String },
    /// Copy a generated file's events into a new draft file
    Import {
        id: String,

        /// Draft file to write (defaults to the calendar file name with .toml)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a generated file, its upload and its history record
    Delete {
        id: String,

        /// Drop the record even if the uploaded file cannot be deleted
        #[arg(long)]
        abandon_remote: bool,
    },
    /// Remove uploaded files past the retention window
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = CalShareConfig::load()?;

    let sweep = match cli.command {
        Commands::Generate { .. } | Commands::History | Commands::Show { .. } => {
            start_background_sweep(&config)
        }
        _ => None,
    };

    let result = match cli.command {
        Commands::New {
            path,
            events,
            file_name,
        } => commands::new::run(&path, events, file_name, config.max_drafts),
        Commands::Preview { path, occurrences } => commands::preview::run(&path, occurrences),
        Commands::Generate { path } => commands::generate::run(&config, &path).await,
        Commands::History => commands::history::run(&config).await,
        Commands::Show { id } => commands::show::run(&config, &id).await,
        Commands::Import { id, output } => commands::import::run(&config, &id, output).await,
        Commands::Delete { id, abandon_remote } => {
            commands::delete::run(&config, &id, abandon_remote).await
        }
        Commands::Sweep => commands::sweep::run(&config).await,
    };

    if let Some((token, handle)) = sweep {
        finish_background_sweep(token, handle).await;
    }

    result
}

/// Best-effort cleanup of expired uploads while a command runs. Failing to
/// start it never fails the command.
fn start_background_sweep(
    config: &CalShareConfig,
) -> Option<(CancellationToken, JoinHandle<CalShareResult<SweepReport>>)> {
    let retention = match config.retention() {
        Ok(retention) => retention,
        Err(e) => {
            warn!(error = %e, "background sweep not started");
            return None;
        }
    };

    let token = CancellationToken::new();
    let sweeper = Arc::new(ExpirationSweeper::new(&Stores::from_config(config), retention));
    Some((token.clone(), sweeper.spawn(token)))
}

/// Stops the sweep before its next object and reports how it went.
async fn finish_background_sweep(
    token: CancellationToken,
    handle: JoinHandle<CalShareResult<SweepReport>>,
) {
    token.cancel();
    match handle.await {
        Ok(Ok(report)) if !report.failures.is_empty() => {
            warn!(failed = report.failures.len(), "background sweep finished with failures");
        }
        Ok(Ok(report)) => {
            debug!(deleted = report.deleted, records_removed = report.records_removed, "background sweep done");
        }
        Ok(Err(e)) => warn!(error = %e, "background sweep failed"),
        Err(e) => warn!(error = %e, "background sweep task failed"),
    }
}

/// Logs go to stderr so they never mix with generated output. `RUST_LOG`
/// overrides the default `warn` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
