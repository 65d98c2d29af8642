//! Gateway error taxonomy.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the messaging gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway not reachable at {path:?}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gateway I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited by gateway, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Gateway rejected request [{code}]: {message}")]
    Remote { code: String, message: String },

    #[error("Malformed gateway payload: {0}")]
    Protocol(#[source] serde_json::Error),

    #[error("Gateway closed the connection")]
    Closed,

    #[error("Timeout waiting for gateway after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether the error came from shutdown rather than the gateway itself.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}
