//! Backend dialer (tokio-tungstenite client).
//!
//! Opens the VNC-over-WebSocket connection for one session. `ws://` and
//! `wss://` (rustls, webpki roots) targets are supported. The handshake is
//! bounded by the configured timeout; there are no retries.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vncrelay_core::error::RelayError;

/// Sub-protocol requested from the backend.
pub const BACKEND_PROTOCOL: &str = "binary";

pub type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a backend dial failed.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("{0}")]
    Handshake(String),
    #[error("handshake timed out after {0}ms")]
    TimedOut(u128),
}

impl DialError {
    /// `result` label of `vncrelay_dials_total`.
    pub fn metric_label(&self) -> &'static str {
        match self {
            DialError::TimedOut(_) => "timeout",
            DialError::InvalidTarget(_) | DialError::Handshake(_) => "error",
        }
    }
}

impl From<DialError> for RelayError {
    fn from(e: DialError) -> Self {
        RelayError::Dial(e.to_string())
    }
}

/// Install rustls' ring provider as the process default.
///
/// Returns false when another provider was already installed.
pub fn install_crypto_provider() -> bool {
    rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok()
}

/// Dial `target` with `Sec-WebSocket-Protocol: binary`.
pub async fn dial_backend(target: &str, timeout: Duration) -> Result<BackendSocket, DialError> {
    let mut req = target
        .into_client_request()
        .map_err(|e| DialError::InvalidTarget(e.to_string()))?;
    req.headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(BACKEND_PROTOCOL));

    match tokio::time::timeout(timeout, connect_async(req)).await {
        Ok(Ok((ws, _resp))) => Ok(ws),
        Ok(Err(e)) => Err(DialError::Handshake(e.to_string())),
        Err(_) => Err(DialError::TimedOut(timeout.as_millis())),
    }
}
