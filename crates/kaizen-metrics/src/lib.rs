//! Typed metric registry for the Kaizen control plane (C1)
//!
//! Gauges, counters and bucketed histograms with Prometheus-compatible
//! text exposition, and a consistent point-in-time snapshot consumed by
//! the safety evaluator and opportunity detector.

pub mod registry;
pub mod types;

#[cfg(feature = "http-server")]
pub mod server;

pub use registry::MetricRegistry;
pub use types::{HistogramSnapshot, LabelSet, MetricKind, MetricSnapshot};

#[cfg(feature = "http-server")]
pub use server::{serve, DEFAULT_PORT};
