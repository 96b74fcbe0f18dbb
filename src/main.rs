//! pypi-index - A private PyPI-compatible package index
//!
//! This is the main entry point for the pypi-index application.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use pypi_index::auth::{AuthManager, RateLimitConfig};
use pypi_index::config::Config;
use pypi_index::database::SqliteDatabase;
use pypi_index::index::{IndexSettings, PackageIndex};
use pypi_index::logging::init_logging;
use pypi_index::server::{AppState, Server};
use pypi_index::storage::{DistributionStore, FilesystemStore};

/// pypi-index - A private PyPI-compatible package index
#[derive(Parser, Debug)]
#[command(name = "pypi-index")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "PYPI_INDEX_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create an account without going through the `user` action
    CreateUser {
        #[arg(long)]
        username: String,

        #[arg(long, default_value = "")]
        email: String,

        #[arg(long, env = "PYPI_INDEX_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging(&config.logging)?;

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    let auth_manager = Arc::new(AuthManager::new(
        Arc::clone(&database),
        RateLimitConfig::from(&config.auth.rate_limit),
    ));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, database, auth_manager).await,
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            let user = auth_manager
                .register_user(&username, &email, &password)
                .await?;
            info!(username = %user.username, "User created");
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    database: Arc<SqliteDatabase>,
    auth_manager: Arc<AuthManager<SqliteDatabase>>,
) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting pypi-index"
    );

    let store = FilesystemStore::new_with_init(&config.storage.base_path).await?;
    let store: Arc<dyn DistributionStore> = Arc::new(store);
    info!(path = %config.storage.base_path, "Distribution store initialized");

    let settings = IndexSettings::from(&config.index);
    info!(
        allow_version_overwrite = settings.allow_version_overwrite,
        registration_open = settings.registration_open,
        "Package index initialized"
    );

    let state = AppState {
        index: Arc::new(PackageIndex::new(database, store, auth_manager, settings)),
        max_upload_bytes: config.storage.max_upload_bytes(),
    };

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("pypi-index shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // tracing is not initialized yet
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
