//! Error types for the control runtime
use thiserror::Error;

/// Control runtime errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// sACN packetization / addressing failure
    #[error("DMX error: {0}")]
    Dmx(String),

    /// Socket send failure; non-fatal, retried every tick
    #[error("network error: {0}")]
    Network(String),

    /// Input device missing or unreadable; non-fatal
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Web API or HTTP server error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Standard IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Domain validation or lookup failure
    #[error(transparent)]
    Core(#[from] followspot_core::CoreError),

    /// Persistence failure surfaced through the API
    #[error(transparent)]
    Persistence(#[from] followspot_io::IoError),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
