//! Relay route handler.
//!
//! Responsibilities:
//! - Reject non-WebSocket or disallowed requests with HTTP 400 (JSON body)
//! - Upgrade with the engine's buffer sizes and sub-protocols
//! - Hand the upgraded socket and the raw query string to the engine
//!
//! The resolver is only consulted after a successful upgrade.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        RawQuery, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use vncrelay_core::error::RelayError;

use crate::app_state::AppState;

fn upgrade_error(app: &AppState, e: RelayError) -> Response {
    app.metrics().upgrades.inc(&[("result", "rejected")]);
    tracing::debug!(error = %e, "relay upgrade rejected");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
}

pub async fn relay_upgrade(
    State(app): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rej) => return upgrade_error(&app, RelayError::Upgrade(rej.body_text())),
    };

    let engine = app.engine();
    if let Err(e) = engine.check_request(&headers) {
        return upgrade_error(&app, e);
    }

    app.metrics().upgrades.inc(&[("result", "accepted")]);

    let metrics = app.metrics();
    engine
        .configure_upgrade(ws)
        .on_failed_upgrade(move |e| {
            metrics.upgrades.inc(&[("result", "failed")]);
            tracing::debug!(error = %e, "relay upgrade failed after response");
        })
        .on_upgrade(move |socket| async move {
            let _ = engine.run_session(socket, raw_query).await;
        })
}
