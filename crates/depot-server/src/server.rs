use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// Depot HTTP server.
pub struct DepotServer {
    config: ServerConfig,
}

impl DepotServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Assemble the engine and build the router (useful for testing).
    pub fn router(&self) -> ServerResult<Router> {
        let state = AppState::from_config(&self.config)?;
        let mut router = build_router(state);
        if self.config.permissive_cors {
            router = router.layer(CorsLayer::permissive());
        }
        Ok(router)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            base_url = %self.config.base_url,
            root = %self.config.engine.content_root.display(),
            "depot server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
