//! Error types for persistence
use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum IoError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON config (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parse or write failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Loaded data failed domain validation
    #[error(transparent)]
    Core(#[from] followspot_core::CoreError),
}

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, IoError>;
