//! vncrelay gateway
//!
//! - Viewer page:   GET /no_vnc?vnc_id=...
//! - Relay:         GET /cloud_vnc?vnc_id=...  (WebSocket, relayed to the backend)
//! - Scripts:       GET /scripts/<name>.js
//! - Ops:           /healthz, /metrics
//!
//! Config is read from `$VNCRELAY_CONFIG` (default `vncrelay.yaml`).

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use vncrelay_core::error::{RelayError, Result};
use vncrelay_gateway::{app_state::AppState, config, router, transport::dial};

const DEFAULT_CONFIG_PATH: &str = "vncrelay.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "vncrelay-gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    if !dial::install_crypto_provider() {
        tracing::debug!("rustls crypto provider already installed");
    }
    let path = std::env::var("VNCRELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|e| RelayError::Config(format!("server.listen must be a valid SocketAddr: {e}")))?;

    let state = AppState::from_config(&cfg)?;
    let app = router::build_app(state);

    tracing::info!(
        %listen,
        viewer = %cfg.routes.viewer,
        relay = %cfg.routes.relay,
        scripts = %cfg.routes.scripts,
        "vncrelay-gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind {listen}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Internal(format!("server failed: {e}")))?;

    tracing::info!("vncrelay-gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
