//! Connector: correlation-based RPC plus typed event dispatch over one link.

pub mod events;
pub mod mux;
pub mod registry;
mod rpc;

pub use events::{ConnectorEvent, EventBus};
pub use mux::{Connector, ConnectorOptions};
pub use registry::CorrelationRegistry;
