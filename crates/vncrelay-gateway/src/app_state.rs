//! Shared application state for the relay gateway.
//!
//! Built once at startup and cloned into every handler. Construction returns
//! `Result` so a missing resolver or bad config stops the process before it
//! serves anything.

use std::sync::Arc;

use vncrelay_core::error::Result;
use vncrelay_core::Resolver;

use crate::assets::{AssetStore, MemoryScriptCache, ScriptCache};
use crate::config::{self, GatewayConfig, RoutesSection};
use crate::obs::RelayMetrics;
use crate::relay::{RelayEngine, RelayEngineBuilder};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    routes: RoutesSection,
    engine: Arc<RelayEngine>,
    assets: AssetStore,
}

impl AppState {
    /// Wire an already-built engine with the given routes and script cache.
    pub fn new(routes: RoutesSection, engine: RelayEngine, cache: Arc<dyn ScriptCache>) -> Self {
        let assets = AssetStore::new(
            routes.relay.clone(),
            routes.scripts.clone(),
            engine.id_query_name().to_string(),
            cache,
        );
        Self {
            inner: Arc::new(AppStateInner {
                routes,
                engine: Arc::new(engine),
                assets,
            }),
        }
    }

    /// Default routes and relay settings around a caller-supplied resolver.
    pub fn with_resolver<R: Resolver + 'static>(resolver: R) -> Result<Self> {
        let engine = RelayEngine::builder().resolver(resolver).build()?;
        Ok(Self::new(
            RoutesSection::default(),
            engine,
            Arc::new(MemoryScriptCache::new()),
        ))
    }

    /// Build everything from a validated config file.
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        let engine = RelayEngineBuilder::from_section(&cfg.relay)
            .shared_resolver(config::build_resolver(&cfg.backend))
            .metrics(Arc::new(RelayMetrics::default()))
            .build()?;
        Ok(Self::new(
            cfg.routes.clone(),
            engine,
            Arc::new(MemoryScriptCache::new()),
        ))
    }

    pub fn routes(&self) -> &RoutesSection {
        &self.inner.routes
    }

    pub fn engine(&self) -> Arc<RelayEngine> {
        Arc::clone(&self.inner.engine)
    }

    pub fn assets(&self) -> &AssetStore {
        &self.inner.assets
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.inner.engine.metrics()
    }
}
