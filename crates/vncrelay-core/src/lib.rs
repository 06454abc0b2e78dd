//! vncrelay core: transport-agnostic relay primitives and error types.
//!
//! This crate defines the pieces of a viewer relay session that do not depend
//! on any HTTP or WebSocket stack: the error surface, the opaque frame model,
//! the identifier resolver contract, and dial-target assembly. It carries no
//! async runtime so the gateway (and tests) can reuse it freely.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths must surface as `RelayError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod frame;
pub mod resolver;
pub mod target;

/// Shared result type.
pub use error::{RelayError, Result};
pub use frame::{Frame, FrameKind};
pub use resolver::{Resolver, TableResolver, TemplateResolver};
