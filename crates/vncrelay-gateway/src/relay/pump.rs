//! Duplex frame forwarding for one relay session.
//!
//! Each direction reads one frame and writes it unchanged to the opposite
//! leg until its read or write fails. Both directions run inside a single
//! `select!`: the first one to finish cancels the other, then both sinks are
//! closed. Every sink is written by exactly one direction.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};

use vncrelay_core::error::RelayError;
use vncrelay_core::Frame;

use crate::obs::RelayMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Browser → backend.
    Upstream,
    /// Backend → browser.
    Downstream,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

/// Why one direction stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEnd {
    /// Source sent close or its stream ended.
    SourceClosed,
    ReadFailed(String),
    WriteFailed(String),
}

/// First direction to stop, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub direction: Direction,
    pub end: PumpEnd,
}

impl SessionEnd {
    /// Observability label. Teardown is identical for every reason.
    pub fn reason(&self) -> &'static str {
        use Direction::*;
        use PumpEnd::*;
        match (self.direction, &self.end) {
            (Upstream, SourceClosed) => "browser_closed",
            (Downstream, SourceClosed) => "backend_closed",
            (Upstream, ReadFailed(_)) | (Downstream, WriteFailed(_)) => "browser_error",
            (Downstream, ReadFailed(_)) | (Upstream, WriteFailed(_)) => "backend_error",
        }
    }

    pub fn is_clean(&self) -> bool {
        self.end == PumpEnd::SourceClosed
    }

    pub fn detail(&self) -> Option<&str> {
        match &self.end {
            PumpEnd::SourceClosed => None,
            PumpEnd::ReadFailed(d) | PumpEnd::WriteFailed(d) => Some(d),
        }
    }

    /// Forwarding failure that ended the session, if any.
    pub fn error(&self) -> Option<RelayError> {
        let op = match &self.end {
            PumpEnd::SourceClosed => return None,
            PumpEnd::ReadFailed(_) => "read",
            PumpEnd::WriteFailed(_) => "write",
        };
        let detail = self.detail().unwrap_or_default();
        Some(RelayError::Forward(format!(
            "{} {op}: {detail}",
            self.direction.as_str()
        )))
    }
}

/// Copy frames from `source` to `sink` in arrival order.
pub async fn forward<S, K, E>(
    source: &mut S,
    sink: &mut K,
    direction: Direction,
    metrics: &RelayMetrics,
) -> PumpEnd
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
    K: Sink<Frame> + Unpin,
    K::Error: Display,
{
    loop {
        let frame = match source.next().await {
            None => return PumpEnd::SourceClosed,
            Some(Err(e)) => return PumpEnd::ReadFailed(e.to_string()),
            Some(Ok(f)) => f,
        };

        let labels = [("direction", direction.as_str()), ("kind", frame.kind().as_str())];
        let len = frame.len() as u64;

        if let Err(e) = sink.send(frame).await {
            return PumpEnd::WriteFailed(e.to_string());
        }

        metrics.frames.inc(&labels);
        metrics.frame_bytes.add(&labels, len);
    }
}

/// Relay frames both ways until either direction stops, then close both legs.
///
/// Close errors are ignored (the peer may already be gone); each close is
/// bounded by `close_grace`.
pub async fn relay<BS, BK, US, UK, BE, UE>(
    browser_rx: &mut BS,
    browser_tx: &mut BK,
    backend_rx: &mut US,
    backend_tx: &mut UK,
    close_grace: Duration,
    metrics: &RelayMetrics,
) -> SessionEnd
where
    BS: Stream<Item = Result<Frame, BE>> + Unpin,
    BE: Display,
    BK: Sink<Frame> + Unpin,
    BK::Error: Display,
    US: Stream<Item = Result<Frame, UE>> + Unpin,
    UE: Display,
    UK: Sink<Frame> + Unpin,
    UK::Error: Display,
{
    let end = tokio::select! {
        end = forward(browser_rx, backend_tx, Direction::Upstream, metrics) => {
            SessionEnd { direction: Direction::Upstream, end }
        }
        end = forward(backend_rx, browser_tx, Direction::Downstream, metrics) => {
            SessionEnd { direction: Direction::Downstream, end }
        }
    };

    tokio::join!(
        close_quietly(browser_tx, close_grace),
        close_quietly(backend_tx, close_grace),
    );

    end
}

async fn close_quietly<K>(sink: &mut K, grace: Duration)
where
    K: Sink<Frame> + Unpin,
    K::Error: Display,
{
    match tokio::time::timeout(grace, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(error = %e, "close after session end"),
        Err(_) => tracing::debug!("close did not finish within grace period"),
    }
}
