//! Observability metrics for invoice numbering.
//!
//! Counters are lock-free atomics so recording never contends with the
//! generator lock.

pub mod histogram;
pub mod registry;

pub use histogram::Histogram;
pub use registry::{MetricsSnapshot, NumberingMetrics};
