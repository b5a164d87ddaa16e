//! kanjiquiz core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire-level contracts (envelopes, message tags,
//! payload records) and the error surface shared by the client runtime and
//! any host implementation. It carries no transport or runtime dependencies so
//! it can be reused on both sides of the connection.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input is
//! reported as `QuizError` so a hostile or buggy peer cannot crash the client.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, QuizError, Result};
