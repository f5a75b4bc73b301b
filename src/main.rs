//! Registry sync scheduler.
//!
//! Reconciles the local seller directory against the registry on a fixed
//! interval, or once with `--run-now`.
//!
//! ```bash
//! # Every SYNC_INTERVAL_SECS (default 6h) until Ctrl+C
//! registry-sync
//!
//! # One run, then exit
//! registry-sync --run-now
//!
//! # Print a fresh signing keypair for registry onboarding
//! registry-sync keygen
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use registry_sync::{
    generate_signing_keys, Config, ReconciliationEngine, RegistryClient, SqliteSellerStore,
    SyncRegistryRequest,
};
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Reconcile local sellers with the network registry")]
#[command(version)]
struct Args {
    /// Run the job once immediately and exit
    #[arg(long)]
    run_now: bool,

    /// Environment file loaded before reading configuration
    #[arg(long, default_value = ".env")]
    dotenv: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an ed25519 signing keypair (base64)
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv))?;
    }

    init_tracing();

    if let Some(Command::Keygen) = args.command {
        let keys = generate_signing_keys();
        println!("SIGNING_PUBLIC_KEY={}", keys.public_key);
        println!("PRIVATE_KEY={}", keys.private_key);
        return Ok(());
    }

    let config = Config::from_env().context("Error loading configuration")?;

    // Signing material is checked here, before any domain is attempted
    let client = RegistryClient::from_config(&config).context("Error configuring registry client")?;
    let store = Arc::new(
        SqliteSellerStore::open(&config.database_path).context("Failed to open participant store")?,
    );
    let engine = ReconciliationEngine::new(store.clone(), client);

    let request = SyncRegistryRequest::new(config.registry_env.clone(), config.domains.clone());

    if args.run_now {
        tracing::info!("Starting registry sync job manually...");
        let response = engine.sync_registry(&request).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        drop(engine);
        close_store(store);
        return Ok(());
    }

    let period = config.sync_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(every_secs = period.as_secs(), "Starting sync scheduler...");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::info!("Starting registry sync job...");
                let response = engine.sync_registry(&request).await;
                tracing::info!("Registry sync job completed: {}", response.summary());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down scheduler...");
                break;
            }
        }
    }

    drop(engine);
    close_store(store);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn close_store(store: Arc<SqliteSellerStore>) {
    match Arc::try_unwrap(store) {
        Ok(store) => {
            if let Err(e) = store.close() {
                tracing::error!(error = %e, "Error closing participant store");
            }
        }
        Err(_) => tracing::warn!("Participant store still shared at shutdown"),
    }
}
