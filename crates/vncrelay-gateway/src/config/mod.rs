//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::sync::Arc;

use vncrelay_core::error::{RelayError, Result};
use vncrelay_core::{Resolver, TableResolver, TemplateResolver};

pub use schema::{
    BackendSection, GatewayConfig, OriginsSection, RelaySection, RoutesSection, ServerSection,
};

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RelayError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| RelayError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Build the identifier resolver described by the `backend` section.
pub fn build_resolver(backend: &BackendSection) -> Arc<dyn Resolver> {
    let template = backend.template.clone().map(TemplateResolver::new);
    match (backend.targets.is_empty(), template) {
        (true, Some(t)) => Arc::new(t),
        (_, t) => {
            let table = TableResolver::new(backend.targets.clone());
            match t {
                Some(t) => Arc::new(table.with_fallback(t)),
                None => Arc::new(table),
            }
        }
    }
}
