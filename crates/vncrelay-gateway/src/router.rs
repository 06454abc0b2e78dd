//! Axum router wiring.
//!
//! `build_router` registers the viewer page, the relay upgrade route and the
//! scripts route. Host applications merge it into their own router with
//! `plug`; the standalone binary uses `build_app`, which adds ops routes.

use axum::{routing::get, Router};

use crate::{app_state::AppState, assets, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let routes = state.routes().clone();
    Router::new()
        .route(&routes.viewer, get(assets::http::viewer_page))
        .route(&routes.relay, get(transport::ws::relay_upgrade))
        .route(&format!("{}/:script", routes.scripts), get(assets::http::script))
        .with_state(state)
}

/// Register the viewer routes on an existing router.
pub fn plug(host: Router, state: AppState) -> Router {
    host.merge(build_router(state))
}

pub fn build_app(state: AppState) -> Router {
    let ops = Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .with_state(state.clone());
    plug(ops, state)
}
