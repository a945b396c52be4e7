//! Server instance management

use axum::Router;
use http::{HeaderValue, Method};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{create_router, AppState};

/// KrishiSahay HTTP/WebSocket server
///
/// Manages Axum server lifecycle including startup and graceful shutdown.
pub struct KrishiServer {
    /// Server configuration
    config: ServerConfig,

    /// Shared handler state
    state: AppState,
}

impl KrishiServer {
    /// Create new server instance, loading every resource the config names
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    ///
    /// # Returns
    ///
    /// `Result<KrishiServer, ApiError>` - Server or error
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        if let Err(e) = config.validate() {
            return Err(ApiError::internal(format!("Invalid config: {}", e)));
        }

        let state = AppState::from_config(config.clone()).map_err(|e| {
            error!("Failed to initialize server state: {:#}", e);
            ApiError::internal(format!("Failed to initialize server state: {:#}", e))
        })?;

        Ok(Self { config, state })
    }

    /// Create a server around existing state
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.config
            .socket_addr()
            .map_err(|e| ApiError::internal(format!("Failed to parse address: {}", e)))
    }

    /// Router with state, CORS and request tracing applied
    pub fn app(&self) -> Router {
        let router = create_router()
            .with_state(self.state.clone())
            .layer(cors_layer(&self.config.cors_origins));

        if self.config.enable_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Start server and run until a shutdown signal arrives
    ///
    /// # Returns
    ///
    /// `Result<(), ApiError>` - Success or error
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = self.socket_addr()?;
        let app = self.app();

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind to {}: {:?}", addr, e);
            ApiError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!("Server listening on: {}", self.server_url());

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))
    }

    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get server URL
    #[must_use]
    pub fn server_url(&self) -> String {
        self.config.server_url()
    }

    /// Get WebSocket URL
    #[must_use]
    pub fn websocket_url(&self) -> String {
        self.config.websocket_url()
    }
}

/// CORS for the configured origins; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

/// Wait for shutdown signal
///
/// Resolves on Ctrl+C or, on Unix, SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix;
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received TERM signal");
            }
            Err(e) => {
                error!("Failed to install TERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_default_config() {
        let server = KrishiServer::new(ServerConfig::default()).unwrap();
        assert_eq!(server.server_url(), "http://127.0.0.1:5000");
        assert_eq!(server.websocket_url(), "ws://127.0.0.1:5000/ws");
        assert!(server.socket_addr().is_ok());
    }

    #[test]
    fn test_server_rejects_invalid_config() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(KrishiServer::new(config).is_err());
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_lists() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
