// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skuflow - device-inspection intake, SKU matching and safe archival.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod archive;
mod inspect;
mod queue;
mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use skuflow_config::SkuflowConfig;
use skuflow_core::types::QueueStatus;
use skuflow_core::{ImeiLocks, SkuflowError};
use skuflow_match::SkuMatcher;
use skuflow_queue::QueueProcessor;
use skuflow_storage::SqliteStorage;

/// Skuflow - device-inspection intake, SKU matching and safe archival.
#[derive(Parser, Debug)]
#[command(name = "skuflow", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the worker pool and stale sweeper until SIGINT/SIGTERM.
    Run,
    /// Enqueue inspection payloads from a JSON file (one object or an array).
    Enqueue {
        /// Path to the JSON file.
        file: PathBuf,
    },
    /// Inspect and maintain the intake queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommands,
    },
    /// Archive, restore and count inventory rows.
    Archive {
        #[command(subcommand)]
        action: ArchiveCommands,
    },
    /// Normalize one payload and match it against the active catalog.
    Match {
        /// Path to a JSON file holding a single payload.
        file: PathBuf,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum QueueCommands {
    /// List queue items ordered by id.
    List {
        /// Only items in this status (pending, processing, completed, failed).
        #[arg(long)]
        status: Option<QueueStatus>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Only failed items whose retry budget is spent.
        #[arg(long, conflicts_with = "status")]
        exhausted: bool,
    },
    /// Item counts per status.
    Counts,
    /// Requeue (or fail) items claimed longer than `stale_after_secs`.
    Sweep,
    /// Move retryable failed items within the retry ceiling back to pending.
    Resubmit,
}

#[derive(Subcommand, Debug)]
enum ArchiveCommands {
    /// Archive then delete the inventory rows of one or more IMEIs.
    Delete {
        #[arg(required = true)]
        imeis: Vec<String>,
        /// Recorded as `archived_reason`.
        #[arg(long)]
        reason: Option<String>,
    },
    /// Archive then delete the entire inventory.
    DeleteAll {
        /// Required: acknowledges that every canonical row will be archived.
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Restore the most recently archived rows of an IMEI.
    Restore { imei: String },
    /// Canonical and archived row counts per table.
    Stats,
}

fn load_config(path: Option<&Path>) -> SkuflowConfig {
    let loaded = match path {
        Some(path) => skuflow_config::load_and_validate_path(path),
        None => skuflow_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            skuflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skuflow={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the configured database (creating and migrating it if needed).
pub(crate) async fn open_storage(config: &SkuflowConfig) -> Result<Arc<SqliteStorage>, SkuflowError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// Wire a queue processor onto `storage`.
pub(crate) fn build_processor(
    config: &SkuflowConfig,
    storage: &Arc<SqliteStorage>,
    locks: Arc<ImeiLocks>,
) -> QueueProcessor {
    QueueProcessor::new(
        storage.clone(),
        storage.clone(),
        SkuMatcher::new(&config.matching),
        locks,
        config.queue.clone(),
    )
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), SkuflowError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SkuflowError::Internal(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

fn print_config(config: &SkuflowConfig, json: bool) -> Result<(), SkuflowError> {
    if json {
        return print_json(config);
    }
    let text = toml::to_string_pretty(config)
        .map_err(|e| SkuflowError::Internal(format!("failed to encode config: {e}")))?;
    print!("{text}");
    Ok(())
}

async fn dispatch(cli: Cli, config: SkuflowConfig) -> Result<(), SkuflowError> {
    let json = cli.json;
    match cli.command {
        Commands::Run => run::run(&config).await,
        Commands::Enqueue { file } => queue::enqueue(&config, &file, json).await,
        Commands::Queue { action } => match action {
            QueueCommands::List {
                status,
                limit,
                offset,
                exhausted,
            } => queue::list(&config, status, limit, offset, exhausted, json).await,
            QueueCommands::Counts => queue::counts(&config, json).await,
            QueueCommands::Sweep => queue::sweep(&config, json).await,
            QueueCommands::Resubmit => queue::resubmit(&config, json).await,
        },
        Commands::Archive { action } => match action {
            ArchiveCommands::Delete { imeis, reason } => {
                archive::delete(&config, &imeis, reason.as_deref(), json).await
            }
            ArchiveCommands::DeleteAll { confirm, reason } => {
                archive::delete_all(&config, confirm, reason.as_deref(), json).await
            }
            ArchiveCommands::Restore { imei } => archive::restore(&config, &imei, json).await,
            ArchiveCommands::Stats => archive::stats(&config, json).await,
        },
        Commands::Match { file } => inspect::match_file(&config, &file, json).await,
        Commands::Config => print_config(&config, json),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    init_tracing(&config.log.level);

    if let Err(e) = dispatch(cli, config).await {
        eprintln!("error: {e}");
        if let SkuflowError::ConfirmationRequired { .. } = e {
            eprintln!("hint: re-run with --confirm");
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_queue_list_filters() {
        let cli = Cli::try_parse_from([
            "skuflow", "--json", "queue", "list", "--status", "failed", "--limit", "5",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Queue {
                action: QueueCommands::List { status, limit, offset, exhausted },
            } => {
                assert_eq!(status, Some(QueueStatus::Failed));
                assert_eq!(limit, 5);
                assert_eq!(offset, 0);
                assert!(!exhausted);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["skuflow", "queue", "list", "--status", "done"]).is_err());
    }

    #[test]
    fn delete_requires_an_imei() {
        assert!(Cli::try_parse_from(["skuflow", "archive", "delete"]).is_err());
        let cli = Cli::try_parse_from(["skuflow", "archive", "delete", "1", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Archive { action: ArchiveCommands::Delete { ref imeis, .. } } if imeis.len() == 2
        ));
    }

    #[test]
    fn delete_all_defaults_to_unconfirmed() {
        let cli = Cli::try_parse_from(["skuflow", "archive", "delete-all"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Archive { action: ArchiveCommands::DeleteAll { confirm: false, .. } }
        ));
    }

    #[test]
    fn default_config_prints_as_toml() {
        let config = skuflow_config::load_and_validate_str("").unwrap();
        assert!(print_config(&config, false).is_ok());
    }
}
