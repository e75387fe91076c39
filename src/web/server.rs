//! Relay HTTP server with axum router and graceful shutdown.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ServerError;
use super::handlers::{get_events_sse, get_health, get_index, AppState};
use crate::config::{RelayConfig, DEFAULT_PORT};
use crate::monitor::MonitorController;

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host address to bind to.
    pub host: String,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            cors_permissive: true,
        }
    }
}

impl From<&RelayConfig> for ServerConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            cors_permissive: config.cors_permissive,
        }
    }
}

/// HTTP server exposing the journal stream.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Application state shared across handlers.
    state: AppState,
}

impl RelayServer {
    /// Create a new relay server with default configuration.
    #[must_use]
    pub fn new(monitor: Arc<MonitorController>) -> Self {
        Self {
            config: ServerConfig::default(),
            state: AppState::new(monitor),
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/", get(get_index))
            .route("/events", get(get_events_sse))
            .route("/health", get(get_health))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindError`] if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.address();
        TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::BindError { address, source })
    }

    /// Serve on an already bound listener until `cancel` fires.
    ///
    /// Open streams are closed by stopping the monitor controller, which
    /// lets the graceful shutdown complete.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(
        self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        let app = self.build_router();
        let monitor = Arc::clone(&self.state.monitor);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Relay server listening");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Relay server shutting down gracefully");
                // Streams never end on their own; close them so shutdown can finish
                let stopped = tokio::task::spawn_blocking(move || monitor.stop()).await;
                match stopped {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Failed to stop monitoring"),
                    Err(e) => tracing::error!(error = %e, "Monitor shutdown task failed"),
                }
            })
            .await?;
        Ok(())
    }

    /// Bind and run the server until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }
}
