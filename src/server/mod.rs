//! HTTP server components for pypi-index
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Logging and tracing middleware
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::{logging_middleware, tracing_middleware};
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::database::Database;

/// HTTP Server for pypi-index
///
/// Manages the axum server lifecycle, including:
/// - Binding to configured address
/// - Applying middleware layers
/// - Graceful shutdown handling
/// - Sweeping expired rate-limit entries
pub struct Server<D: Database + 'static> {
    config: ServerConfig,
    state: AppState<D>,
    sweep_interval: Duration,
}

/// How often expired login failures are forgotten
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

impl<D: Database + 'static> Server<D> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self {
            config,
            state,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set how often the rate limiter is swept
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.config.host.parse().unwrap_or([0, 0, 0, 0].into()),
            self.config.port,
        )
    }

    /// Run the server until shutdown signal is received
    ///
    /// Client addresses are passed to handlers so that failed logins can be
    /// rate limited per IP.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let sweeper = spawn_rate_limit_sweeper(&self.state, self.sweep_interval);

        let app = build_router(self.state)
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::compression::CompressionLayer::new());

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Server listening on {}", addr);
        }

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;
        sweeper.abort();
        result.map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

fn spawn_rate_limit_sweeper<D: Database + 'static>(
    state: &AppState<D>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    let auth = std::sync::Arc::clone(state.index.auth());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            auth.cleanup_rate_limits();
            tracing::trace!(clients = auth.tracked_clients(), "Swept rate limiter");
        }
    })
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),
}
