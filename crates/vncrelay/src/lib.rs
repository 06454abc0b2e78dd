//! Top-level facade crate for vncrelay.
//!
//! Re-exports the core types and the gateway library so host applications
//! can depend on a single crate and mount the viewer with
//! `vncrelay::gateway::router::plug`.

pub mod core {
    pub use vncrelay_core::*;
}

pub mod gateway {
    pub use vncrelay_gateway::*;
}
