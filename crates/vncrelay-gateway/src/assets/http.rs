//! HTTP handlers for the viewer page and its scripts.

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app_state::AppState;

pub async fn viewer_page(State(app): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        app.assets().viewer_page(),
    )
        .into_response()
}

pub async fn script(State(app): State<AppState>, Path(name): Path<String>) -> Response {
    match app.assets().script(&name) {
        Ok(js) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/javascript; charset=UTF-8")],
            js,
        )
            .into_response(),
        Err(e) => {
            tracing::debug!(script = %name, error = %e, "script lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "file not found" })),
            )
                .into_response()
        }
    }
}
