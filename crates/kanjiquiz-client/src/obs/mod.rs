//! Lightweight in-process metrics (dependency-free), rendered as Prometheus
//! text by `ClientMetrics::render`.

pub mod metrics;

pub use metrics::ClientMetrics;
