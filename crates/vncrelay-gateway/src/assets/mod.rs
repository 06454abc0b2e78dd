//! Embedded viewer assets (HTML page + JavaScript modules).
//!
//! Files are compiled into the binary. Route placeholders are substituted per
//! request so the same assets work under any mount point:
//! - `@wsRoute@`      relay route
//! - `@scriptsRoute@` scripts route
//! - `@idQueryName@`  session identifier query parameter

pub mod cache;
pub mod http;

use std::sync::Arc;

use vncrelay_core::error::{RelayError, Result};

pub use cache::{MemoryScriptCache, ScriptCache};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

const SCRIPTS: &[(&str, &str)] = &[
    ("des.js", include_str!("../../assets/scripts/des.js")),
    ("eventtarget.js", include_str!("../../assets/scripts/eventtarget.js")),
    ("logging.js", include_str!("../../assets/scripts/logging.js")),
    ("websock.js", include_str!("../../assets/scripts/websock.js")),
    ("xtscancodes.js", include_str!("../../assets/scripts/xtscancodes.js")),
];

pub const WS_ROUTE_PLACEHOLDER: &str = "@wsRoute@";
pub const SCRIPTS_ROUTE_PLACEHOLDER: &str = "@scriptsRoute@";
pub const ID_QUERY_PLACEHOLDER: &str = "@idQueryName@";

/// Serves the embedded assets with placeholders filled in.
pub struct AssetStore {
    ws_route: String,
    scripts_route: String,
    id_query_name: String,
    cache: Arc<dyn ScriptCache>,
}

impl AssetStore {
    pub fn new(
        ws_route: impl Into<String>,
        scripts_route: impl Into<String>,
        id_query_name: impl Into<String>,
        cache: Arc<dyn ScriptCache>,
    ) -> Self {
        Self {
            ws_route: ws_route.into(),
            scripts_route: scripts_route.into(),
            id_query_name: id_query_name.into(),
            cache,
        }
    }

    pub fn script_names() -> impl Iterator<Item = &'static str> {
        SCRIPTS.iter().map(|(n, _)| *n)
    }

    /// Viewer page with every route placeholder replaced.
    pub fn viewer_page(&self) -> String {
        INDEX_HTML
            .replace(WS_ROUTE_PLACEHOLDER, &self.ws_route)
            .replace(SCRIPTS_ROUTE_PLACEHOLDER, &self.scripts_route)
            .replace(ID_QUERY_PLACEHOLDER, &self.id_query_name)
    }

    /// Script `name` with `@scriptsRoute@` replaced.
    pub fn script(&self, name: &str) -> Result<String> {
        let raw = match self.cache.get(name) {
            Some(js) => js,
            None => {
                let js: Arc<str> = Arc::from(lookup(name)?);
                self.cache.put(name, Arc::clone(&js));
                js
            }
        };
        Ok(raw.replace(SCRIPTS_ROUTE_PLACEHOLDER, &self.scripts_route))
    }
}

fn lookup(name: &str) -> Result<&'static str> {
    SCRIPTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, body)| *body)
        .ok_or_else(|| RelayError::Asset(format!("file not found: {name}")))
}
