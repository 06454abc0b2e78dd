//! Relay engine: lifecycle of one viewer session.
//!
//! connecting → relaying → closed. The engine is built once (the resolver is
//! mandatory at build time) and shared by every session.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::HeaderMap;
use futures_util::StreamExt;
use tracing::Instrument;

use vncrelay_core::error::{RelayError, Result};
use vncrelay_core::{target, Resolver};

use crate::config::RelaySection;
use crate::obs::RelayMetrics;
use crate::relay::pump::{self, SessionEnd};
use crate::transport::codec::{
    decode_backend, decode_browser, encode_backend, encode_browser, frame_sink, frame_stream,
};
use crate::transport::dial::dial_backend;
use crate::transport::origin::OriginPolicy;

/// Sub-protocols offered to browsers. Only `binary` framing matters for VNC;
/// `chat` is kept for viewer clients that still ask for it.
pub const BROWSER_PROTOCOLS: [&str; 2] = ["binary", "chat"];

pub struct RelayEngineBuilder {
    id_query_name: String,
    resolver: Option<Arc<dyn Resolver>>,
    dial_timeout: Duration,
    write_buffer_size: usize,
    close_grace: Duration,
    origins: OriginPolicy,
    metrics: Option<Arc<RelayMetrics>>,
}

impl Default for RelayEngineBuilder {
    fn default() -> Self {
        Self::from_section(&RelaySection::default())
    }
}

impl RelayEngineBuilder {
    pub fn from_section(s: &RelaySection) -> Self {
        Self {
            id_query_name: s.id_query_name.clone(),
            resolver: None,
            dial_timeout: s.dial_timeout(),
            write_buffer_size: s.write_buffer_size,
            close_grace: s.close_grace(),
            origins: OriginPolicy::from_section(&s.origins),
            metrics: None,
        }
    }

    pub fn id_query_name(mut self, name: impl Into<String>) -> Self {
        self.id_query_name = name.into();
        self
    }

    pub fn resolver<R: Resolver + 'static>(self, r: R) -> Self {
        self.shared_resolver(Arc::new(r))
    }

    pub fn shared_resolver(mut self, r: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(r);
        self
    }

    pub fn dial_timeout(mut self, d: Duration) -> Self {
        self.dial_timeout = d;
        self
    }

    pub fn write_buffer_size(mut self, n: usize) -> Self {
        self.write_buffer_size = n;
        self
    }

    pub fn close_grace(mut self, d: Duration) -> Self {
        self.close_grace = d;
        self
    }

    pub fn origins(mut self, p: OriginPolicy) -> Self {
        self.origins = p;
        self
    }

    pub fn metrics(mut self, m: Arc<RelayMetrics>) -> Self {
        self.metrics = Some(m);
        self
    }

    /// Fails when no resolver was supplied or the id parameter is empty.
    pub fn build(self) -> Result<RelayEngine> {
        let resolver = self
            .resolver
            .ok_or_else(|| RelayError::Config("relay resolver is required".into()))?;
        if self.id_query_name.is_empty() {
            return Err(RelayError::Config("id query parameter name must not be empty".into()));
        }
        if self.origins == OriginPolicy::AllowAll {
            tracing::warn!("relay accepts websocket upgrades from any origin");
        }
        Ok(RelayEngine {
            id_query_name: self.id_query_name,
            resolver,
            dial_timeout: self.dial_timeout,
            write_buffer_size: self.write_buffer_size,
            close_grace: self.close_grace,
            origins: self.origins,
            metrics: self.metrics.unwrap_or_default(),
            seq: AtomicU64::new(1),
        })
    }
}

pub struct RelayEngine {
    id_query_name: String,
    resolver: Arc<dyn Resolver>,
    dial_timeout: Duration,
    write_buffer_size: usize,
    close_grace: Duration,
    origins: OriginPolicy,
    metrics: Arc<RelayMetrics>,
    seq: AtomicU64,
}

impl fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayEngine")
            .field("id_query_name", &self.id_query_name)
            .field("dial_timeout", &self.dial_timeout)
            .field("origins", &self.origins)
            .finish_non_exhaustive()
    }
}

impl RelayEngine {
    pub fn builder() -> RelayEngineBuilder {
        RelayEngineBuilder::default()
    }

    pub fn id_query_name(&self) -> &str {
        &self.id_query_name
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Pre-upgrade checks on the raw request.
    pub fn check_request(&self, headers: &HeaderMap) -> Result<()> {
        self.origins.check(headers)
    }

    /// Apply the write buffer size and offered sub-protocols to a pending upgrade.
    pub fn configure_upgrade(&self, ws: WebSocketUpgrade) -> WebSocketUpgrade {
        // axum 0.7 cannot negotiate permessage-deflate; frames go uncompressed.
        ws.write_buffer_size(self.write_buffer_size)
            .protocols(BROWSER_PROTOCOLS)
    }

    /// Identifier and dial URL for an inbound raw query string.
    pub fn dial_target_for(&self, raw_query: Option<&str>) -> (String, String) {
        let id = target::session_id(raw_query, &self.id_query_name);
        let resolved = self.resolver.resolve(&id);
        let url = target::dial_target(&resolved, raw_query);
        (id, url)
    }

    /// Run one session on an upgraded browser socket. Returns once both legs
    /// are closed; `None` when the backend could not be dialed.
    pub async fn run_session(&self, socket: WebSocket, raw_query: Option<String>) -> Option<SessionEnd> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let (id, url) = self.dial_target_for(raw_query.as_deref());
        let span = tracing::info_span!("relay", session = n, id = %id);
        self.drive(socket, url).instrument(span).await
    }

    async fn drive(&self, socket: WebSocket, url: String) -> Option<SessionEnd> {
        let m = &self.metrics;

        let started = Instant::now();
        let backend = match dial_backend(&url, self.dial_timeout).await {
            Ok(b) => b,
            Err(e) => {
                m.dials.inc(&[("result", e.metric_label())]);
                let err = RelayError::from(e);
                tracing::warn!(target_url = %url, error = %err, code = err.code().as_str(), "backend dial failed");
                let _ = tokio::time::timeout(self.close_grace, socket.close()).await;
                return None;
            }
        };
        m.dials.inc(&[("result", "ok")]);
        m.dial_duration.observe(started.elapsed());
        tracing::info!(target_url = %url, "relay session started");

        let _active = m.sessions_active.track();

        let (browser_tx, browser_rx) = socket.split();
        let (backend_tx, backend_rx) = backend.split();
        let mut browser_rx = frame_stream(browser_rx, decode_browser);
        let mut browser_tx = frame_sink(browser_tx, encode_browser);
        let mut backend_rx = frame_stream(backend_rx, decode_backend);
        let mut backend_tx = frame_sink(backend_tx, encode_backend);

        let end = pump::relay(
            &mut browser_rx,
            &mut browser_tx,
            &mut backend_rx,
            &mut backend_tx,
            self.close_grace,
            m,
        )
        .await;

        m.session_ends.inc(&[("reason", end.reason())]);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match end.error() {
            None => tracing::info!(reason = end.reason(), elapsed_ms, "relay session ended"),
            Some(err) => tracing::info!(
                reason = end.reason(),
                error = %err,
                code = err.code().as_str(),
                elapsed_ms,
                "relay session ended"
            ),
        }
        Some(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use vncrelay_core::error::ErrorCode;

    #[test]
    fn missing_resolver_fails_at_build_time() {
        let err = RelayEngine::builder().build().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
        assert!(err.to_string().contains("resolver"));
    }

    #[test]
    fn empty_id_parameter_is_rejected() {
        let err = RelayEngine::builder()
            .resolver(|_: &str| String::new())
            .id_query_name("")
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
    }

    #[test]
    fn dial_target_uses_resolver_once_and_keeps_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let engine = RelayEngine::builder()
            .resolver(move |id: &str| {
                c.fetch_add(1, Ordering::SeqCst);
                format!("ws://backend:6080/{id}")
            })
            .build()
            .unwrap();

        let raw = "vnc_id=desk-9&autoconnect=1&resize=remote";
        let (id, url) = engine.dial_target_for(Some(raw));
        assert_eq!(id, "desk-9");
        assert_eq!(url, format!("ws://backend:6080/desk-9?{raw}"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_id_parameter_and_missing_value() {
        let engine = RelayEngine::builder()
            .id_query_name("host")
            .resolver(|id: &str| format!("ws://b/{id}"))
            .build()
            .unwrap();
        assert_eq!(engine.dial_target_for(Some("host=h1")).1, "ws://b/h1?host=h1");
        assert_eq!(engine.dial_target_for(None), (String::new(), "ws://b/?".to_string()));
    }
}
