//! Transport layer (WebSocket).
//!
//! Browser-facing upgrade handler, origin guard, backend dialer, and the
//! codec that turns both legs' messages into opaque relay frames.

pub mod codec;
pub mod dial;
pub mod origin;
pub mod ws;
