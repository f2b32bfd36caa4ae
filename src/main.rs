//! Roster API Server
//!
//! Run with: cargo run --bin roster
//!
//! # Configuration
//!
//! Settings come from a TOML file (`--config`, or the first of
//! `~/.config/roster/config.toml`, `/etc/roster/config.toml`, `./config.toml`)
//! and are overridden by environment variables:
//! - `ROSTER_DB_PATH`: SQLite file (default: platform data dir)
//! - `ROSTER_DB_IN_MEMORY`: Keep records in memory only (default: false)
//! - `ROSTER_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `ROSTER_API_PORT`: Port to listen on (default: 8080)
//! - `ROSTER_QUEUE_CAPACITY`: Events buffered per watcher (default: 10)
//! - `ROSTER_LOG_LEVEL` / `ROSTER_LOG_FORMAT`: Logging (default: info / pretty)
//! - `RUST_LOG`: Takes precedence over the configured level

use clap::Parser;
use roster::api::{serve, AppState};
use roster::config::{Config, LoggingConfig};
use roster::notifier::SubscriptionRegistry;
use roster::users::{SqliteUserRepository, UserRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "User-record service with real-time change notifications")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep user records in memory only
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if args.in_memory {
        config.database.in_memory = true;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Roster API server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize user store
    let repository: Arc<dyn UserRepository> = if config.database.in_memory {
        tracing::info!("Using in-memory user store");
        Arc::new(SqliteUserRepository::in_memory()?)
    } else {
        tracing::info!(path = %config.database.path, "Opening user store");
        Arc::new(SqliteUserRepository::open(&config.database.path)?)
    };

    let notifier = Arc::new(SubscriptionRegistry::new(config.notifier.queue_capacity));
    tracing::info!(
        queue_capacity = notifier.capacity(),
        "Change notifier ready"
    );

    let state = AppState::new(repository, Arc::clone(&notifier), config.api.clone());

    // Run server
    serve(state, &config.api).await?;

    let stats = notifier.stats();
    tracing::info!(
        events_broadcast = stats.events_broadcast,
        deliveries_dropped = stats.deliveries_dropped,
        "Roster API server stopped"
    );

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("roster={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
