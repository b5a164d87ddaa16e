//! kanjiquiz client runtime.
//!
//! Wires the transport, the request/response connector, the session state
//! machine and the question supply into one client. Consumed by the binary
//! (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod collab;
pub mod config;
pub mod connector;
pub mod obs;
pub mod session;
pub mod supply;
pub mod transport;
