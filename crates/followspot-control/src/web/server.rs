//! Axum HTTP server

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::http::{header, Method};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use followspot_core::{ConfigStore, LogRing, RuntimeHandle};

use super::routes::build_router;
use crate::input::{DeviceProvider, VirtualPad};
use crate::runner::LoopCommand;
use crate::{error::ControlError, Result};

/// Application state shared across all requests.
pub struct ApiContext {
    /// Shared config store
    pub store: Arc<ConfigStore>,
    /// Runtime status written by the control loop
    pub runtime: RuntimeHandle,
    /// Virtual joystick holder
    pub pad: Arc<VirtualPad>,
    /// Ring buffer behind /api/logs
    pub log_ring: Arc<LogRing>,
    /// Command channel into the control loop
    pub commands: Sender<LoopCommand>,
    /// HID enumeration for /api/usb/devices
    pub provider: Arc<dyn DeviceProvider>,
    /// At most one restart confirmation pending
    pub restart_pending: Mutex<Option<Instant>>,
}

impl ApiContext {
    /// Send a command to the control loop; a closed channel means the loop
    /// died, which the API reports as an internal error.
    pub fn send_command(&self, command: LoopCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ControlError::Http("control loop is not running".into()))
    }
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    /// Bind host; the UI is served to the trusted LAN
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Allow cross-origin requests from the UI dev server
    pub enable_cors: bool,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Run the web server until the process exits.
pub async fn serve(config: WebServerConfig, ctx: Arc<ApiContext>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ControlError::Http(format!("invalid bind address: {e}")))?;

    let mut app = build_router().with_state(ctx);
    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE])
                .allow_origin(Any),
        );
    }

    tracing::info!(%addr, "web server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControlError::Http(format!("bind failed: {e}")))?;
    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| ControlError::Http(format!("server error: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WebServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.enable_cors);
    }
}
