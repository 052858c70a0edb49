//! Metrics collection and exposition for Prometheus scraping.
//!
//! This module provides the in-process registry, the application metric set,
//! the request instrumentation middleware and the text-format renderer.

pub mod exposition;
pub mod instrument;
mod recorder;
pub mod registry;

pub use recorder::{Metrics, MetricsRecorder};
