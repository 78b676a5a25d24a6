//! # Bridge Harvester CLI (`bridges`)
//!
//! ## Usage
//!
//! ```bash
//! bridges --config ./config/bridges.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bridges init` | Prepare the configured storage backend |
//! | `bridges sources` | Show configured source pages, storage and notifier |
//! | `bridges run` | Run the pipeline once and print the report as JSON |
//! | `bridges serve` | Start the scheduler and the HTTP trigger server |
//! | `bridges list` | Print stored bridges per category |
//! | `bridges check <file>` | Extract and classify a saved page offline |
//!
//! Diagnostics go to stderr; set `RUST_LOG` (default `info`) to adjust.

use std::path::PathBuf;
use std::sync::Arc;

use bridge_harvester::classify::SystemClock;
use bridge_harvester::models::Category;
use bridge_harvester::pipeline::Harvester;
use bridge_harvester::runner::RunCoordinator;
use bridge_harvester::server::{self, AppState};
use bridge_harvester::{config, inspect, scheduler, sources, store};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bridge Harvester: collects obfs4 and webtunnel bridges from public
/// distribution pages and announces new ones.
///
/// Settings are read from a TOML file; a missing file means defaults.
/// `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `INTERVAL_HOURS`,
/// `DISABLE_INTERNAL_CRON` and `BIND_ADDR` override the file.
#[derive(Parser)]
#[command(
    name = "bridges",
    about = "Bridge Harvester: scrape, deduplicate and announce Tor bridges",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bridges.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare storage (JSON directory or SQLite schema). Idempotent.
    Init,

    /// Show configured source pages, storage backend and notifier.
    Sources,

    /// Run the pipeline once.
    ///
    /// Prints `{"ok":true,"report":{...}}` on stdout when the run finishes.
    Run,

    /// Start the internal scheduler and the HTTP trigger server.
    Serve,

    /// Print stored bridges per category.
    List {
        /// Only show this category (e.g. `obfs4_ipv4`).
        #[arg(long)]
        category: Option<Category>,
    },

    /// Extract and classify bridge lines from a saved page.
    ///
    /// Touches neither storage nor notifications.
    Check {
        /// Path to the saved HTML or text file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            store::init_store(&cfg).await?;
            println!("Storage initialized ({}).", cfg.storage.backend);
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
        Commands::Run => {
            let harvester = Harvester::from_config(&cfg).await?;
            let report = harvester.run_once().await?;
            let summary = serde_json::json!({ "ok": true, "report": report });
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Serve => {
            let harvester = Arc::new(Harvester::from_config(&cfg).await?);
            let coordinator = Arc::new(RunCoordinator::new());

            if cfg.schedule.enabled {
                scheduler::spawn_scheduler(
                    Arc::clone(&harvester),
                    Arc::clone(&coordinator),
                    scheduler::period_from_hours(cfg.schedule.interval_hours),
                );
            } else {
                info!("Internal scheduler disabled");
            }

            server::run_server(
                &cfg.server.bind,
                AppState {
                    harvester,
                    coordinator,
                },
            )
            .await?;
        }
        Commands::List { category } => {
            inspect::run_list(&cfg, category).await?;
        }
        Commands::Check { path } => {
            inspect::run_check(&path, &SystemClock)?;
        }
    }

    Ok(())
}
