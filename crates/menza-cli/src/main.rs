mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use menza_remote::{Domains, MenzaClient, MenzaClientConfig, MenzaParams};
use menza_store::SqliteStore;
use menza_sync::{Clock, Storage, SyncOrchestrator, SystemClock, ValidityStore, ValidityTracker};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::sync::SyncRequest;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "menza")]
#[command(about = "Cafeteria menus, cached for offline use")]
struct Cli {
    /// Content language (defaults to the configured one)
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Cafeteria subsystem ID (defaults to the configured one)
    #[arg(long, global = true)]
    subsystem: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync datasets from the backend into the local cache
    Sync {
        /// Datasets to sync (menu-list, dishes, cafeteria-info, weekly-menu)
        datasets: Vec<String>,
        /// Sync even if the data is still considered fresh
        #[arg(long)]
        force: bool,
        /// Refetch everything, ignoring stored content hashes
        #[arg(long, conflicts_with = "force")]
        rebuild: bool,
    },
    /// Show cached data of one dataset, refreshing it first if due
    Show {
        /// Dataset name
        dataset: String,
    },
    /// Show when each dataset was last updated
    Status,
    /// Delete all cached data
    Wipe,
}

struct App {
    store: Arc<SqliteStore>,
    domains: Domains,
    params: MenzaParams,
    offset: FixedOffset,
}

fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("could not determine cache directory")?;
    let dir = base.join("menza");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

fn db_path() -> Result<PathBuf> {
    Ok(cache_dir()?.join("menza.db"))
}

fn build_app(config: &AppConfig, cli: &Cli) -> Result<App> {
    let offset = config.server_offset()?;
    let path = db_path()?;
    debug!(path = %path.display(), "opening cache");
    let store = Arc::new(
        SqliteStore::open(&path)
            .with_context(|| format!("failed to open cache at {}", path.display()))?,
    );

    let client = MenzaClient::new(MenzaClientConfig {
        api_base_url: config.api_base_url.clone(),
        timeout: config.request_timeout(),
    })?;

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&store) as Arc<dyn Storage>
    ));
    let tracker = Arc::new(ValidityTracker::new(
        Arc::clone(&store) as Arc<dyn ValidityStore>,
        Arc::new(SystemClock) as Arc<dyn Clock>,
        offset,
    ));
    let domains = Domains::new(
        Arc::new(client),
        orchestrator,
        tracker,
        config.fan_out_limit,
    );

    let params = MenzaParams::new(
        cli.lang.clone().unwrap_or_else(|| config.language.clone()),
        cli.subsystem.or(config.subsystem),
    );

    Ok(App {
        store,
        domains,
        params,
        offset,
    })
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = config::load_config();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_tracing(&config);
    if let Err(e) = &loaded {
        warn!("{e:#}, using defaults");
    }

    let app = build_app(&config, &cli)?;

    match cli.command {
        Command::Sync {
            datasets,
            force,
            rebuild,
        } => {
            let request = if rebuild {
                SyncRequest::Rebuild
            } else if force {
                SyncRequest::Forced
            } else {
                SyncRequest::Normal
            };
            let selected = commands::sync::select(&app.domains, &app.params, &datasets)?;
            commands::sync::run(&selected, &app.params, request).await
        }
        Command::Show { dataset } => {
            let Some(dataset) = app.domains.get(&dataset) else {
                anyhow::bail!(
                    "unknown dataset: {dataset} (expected one of: {})",
                    commands::sync::dataset_names(&app.domains)
                );
            };
            commands::show::run(&app.store, dataset, &app.params).await
        }
        Command::Status => {
            commands::status::run(&app.store, &app.domains, &app.params, &app.offset)
        }
        Command::Wipe => commands::wipe::run(&app.store),
    }
}
