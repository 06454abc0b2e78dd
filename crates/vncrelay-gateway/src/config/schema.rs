use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use vncrelay_core::error::{RelayError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub routes: RoutesSection,

    #[serde(default)]
    pub relay: RelaySection,

    pub backend: BackendSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.routes.validate()?;
        self.relay.validate()?;
        self.backend.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

/// Paths served by the ops endpoints of the standalone binary.
pub const RESERVED_ROUTES: [&str; 2] = ["/healthz", "/metrics"];

/// HTTP routes registered by the plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesSection {
    #[serde(default = "default_viewer_route")]
    pub viewer: String,

    #[serde(default = "default_relay_route")]
    pub relay: String,

    #[serde(default = "default_scripts_route")]
    pub scripts: String,
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            viewer: default_viewer_route(),
            relay: default_relay_route(),
            scripts: default_scripts_route(),
        }
    }
}

impl RoutesSection {
    pub fn validate(&self) -> Result<()> {
        for (name, r) in [("viewer", &self.viewer), ("relay", &self.relay), ("scripts", &self.scripts)] {
            if !r.starts_with('/') || r.len() < 2 {
                return Err(RelayError::Config(format!(
                    "routes.{name} must start with '/' and not be the root: {r}"
                )));
            }
            if r.ends_with('/') || r.contains(':') || r.contains('*') || r.contains('?') {
                return Err(RelayError::Config(format!(
                    "routes.{name} must be a plain path without trailing '/': {r}"
                )));
            }
        }
        for r in [&self.viewer, &self.relay, &self.scripts] {
            if RESERVED_ROUTES.contains(&r.as_str()) {
                return Err(RelayError::Config(format!("route {r} is reserved")));
            }
        }
        if self.viewer == self.relay || self.viewer == self.scripts || self.relay == self.scripts {
            return Err(RelayError::Config("routes must be distinct".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    #[serde(default = "default_id_query_name")]
    pub id_query_name: String,

    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    /// Outbound buffer of the browser leg. axum 0.7 exposes no read-side knob.
    #[serde(default = "default_buffer_size")]
    pub write_buffer_size: usize,

    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,

    #[serde(default)]
    pub origins: OriginsSection,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            id_query_name: default_id_query_name(),
            dial_timeout_ms: default_dial_timeout_ms(),
            write_buffer_size: default_buffer_size(),
            close_grace_ms: default_close_grace_ms(),
            origins: OriginsSection::default(),
        }
    }
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        if self.id_query_name.trim().is_empty() {
            return Err(RelayError::Config("relay.id_query_name must not be empty".into()));
        }
        if !(100..=120_000).contains(&self.dial_timeout_ms) {
            return Err(RelayError::Config(
                "relay.dial_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        if !(256..=1_048_576).contains(&self.write_buffer_size) {
            return Err(RelayError::Config(
                "relay.write_buffer_size must be between 256 and 1048576".into(),
            ));
        }
        if self.close_grace_ms > 30_000 {
            return Err(RelayError::Config("relay.close_grace_ms must be at most 30000".into()));
        }
        self.origins.validate()
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

/// Browser origin acceptance for the relay route.
///
/// `allow_all: true` accepts every origin (the viewer is usually embedded
/// cross-origin). Setting it to false requires an explicit allowlist.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginsSection {
    #[serde(default = "default_true")]
    pub allow_all: bool,

    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl Default for OriginsSection {
    fn default() -> Self {
        Self { allow_all: true, allowlist: Vec::new() }
    }
}

impl OriginsSection {
    pub fn validate(&self) -> Result<()> {
        if !self.allow_all && self.allowlist.is_empty() {
            return Err(RelayError::Config(
                "relay.origins.allowlist must not be empty when allow_all is false".into(),
            ));
        }
        Ok(())
    }
}

/// Resolver source for the standalone binary.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    /// URL template with an `{id}` placeholder.
    #[serde(default)]
    pub template: Option<String>,

    /// Exact identifier → URL table, consulted before the template.
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl BackendSection {
    pub fn validate(&self) -> Result<()> {
        if self.template.is_none() && self.targets.is_empty() {
            return Err(RelayError::Config(
                "backend needs a template or at least one target".into(),
            ));
        }
        if let Some(t) = &self.template {
            if !is_ws_url(t) {
                return Err(RelayError::Config(format!(
                    "backend.template must be a ws:// or wss:// URL: {t}"
                )));
            }
        }
        for (id, url) in &self.targets {
            if !is_ws_url(url) {
                return Err(RelayError::Config(format!(
                    "backend.targets.{id} must be a ws:// or wss:// URL: {url}"
                )));
            }
        }
        Ok(())
    }
}

fn is_ws_url(s: &str) -> bool {
    s.starts_with("ws://") || s.starts_with("wss://")
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_viewer_route() -> String {
    "/no_vnc".into()
}
fn default_relay_route() -> String {
    "/cloud_vnc".into()
}
fn default_scripts_route() -> String {
    "/scripts".into()
}
fn default_id_query_name() -> String {
    "vnc_id".into()
}
fn default_dial_timeout_ms() -> u64 {
    10_000
}
fn default_buffer_size() -> usize {
    1024
}
fn default_close_grace_ms() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}
