//! Metrics for the retail pipeline
//!
//! Stages emit through the `metrics` facade; whichever recorder the host
//! process installs receives them. Without a recorder the macros are no-ops.
//! Every metric name lives in [`catalog`] together with its documentation.

pub mod catalog;
pub mod core;
pub mod registry;

pub use self::core::{time_stage, TimingGuard};
pub use registry::register_all_metrics;

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}
