//! vncrelay gateway library entry.
//!
//! Wires the transport, relay engine, embedded viewer assets and ops
//! endpoints into an axum router. It is consumed by the binary (`main.rs`),
//! by host applications that mount the viewer routes, and by integration
//! tests.

pub mod app_state;
pub mod assets;
pub mod config;
pub mod obs;
pub mod ops;
pub mod relay;
pub mod router;
pub mod transport;
