//! Shared error type across vncrelay crates.

use thiserror::Error;

/// Stable error codes (used in JSON responses, logs and metric labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid construction-time configuration.
    Config,
    /// Inbound WebSocket handshake failed.
    Upgrade,
    /// Backend WebSocket could not be reached.
    Dial,
    /// A frame could not be read or written mid-session.
    Forward,
    /// Unknown embedded asset.
    Asset,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses and labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Config => "CONFIG",
            ErrorCode::Upgrade => "UPGRADE",
            ErrorCode::Dial => "DIAL",
            ErrorCode::Forward => "FORWARD",
            ErrorCode::Asset => "ASSET",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("websocket upgrade error: {0}")]
    Upgrade(String),
    #[error("backend dial failed: {0}")]
    Dial(String),
    #[error("forward failed: {0}")]
    Forward(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Config(_) => ErrorCode::Config,
            RelayError::Upgrade(_) => ErrorCode::Upgrade,
            RelayError::Dial(_) => ErrorCode::Dial,
            RelayError::Forward(_) => ErrorCode::Forward,
            RelayError::Asset(_) => ErrorCode::Asset,
            RelayError::Internal(_) => ErrorCode::Internal,
        }
    }
}
