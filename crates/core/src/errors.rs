//! Error types for the core crate.

use thiserror::Error;

use crate::sync::GatewayError;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the store, codecs and sync engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Local state file I/O error
    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote gateway error
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Invalid argument or state
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
