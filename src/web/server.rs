//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::{NovynyError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// The web server: binds the configured address and serves the router.
pub struct WebServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a server from configuration and shared state.
    pub fn new(config: &ServerConfig, state: Arc<AppState>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|_| {
                NovynyError::Config(format!(
                    "invalid server address: {}:{}",
                    config.host, config.port
                ))
            })?;
        Ok(Self { addr, state })
    }

    /// The configured bind address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve until the process exits.
    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);
        let listener = TcpListener::bind(self.addr).await?;
        info!("Web server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, router).await?;
        Ok(())
    }
}
