//! Relay engine and duplex forwarding.

pub mod engine;
pub mod pump;

pub use engine::{RelayEngine, RelayEngineBuilder};
pub use pump::{Direction, PumpEnd, SessionEnd};
