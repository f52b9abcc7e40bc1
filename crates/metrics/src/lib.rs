//! Metrics collection and export for the tickets workspace.
//!
//! This crate provides a unified metrics interface using the `metrics` crate facade.
//! When the `prometheus` feature is enabled, metrics are exported in Prometheus format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tickets_metrics::{closure, counter, histogram};
//!
//! counter!(closure::CLOSURES_TOTAL, "source" => "command").increment(1);
//! histogram!(closure::DURATION_SECONDS).record(0.42);
//! ```
//!
//! # Features
//!
//! - `prometheus`: Enable Prometheus text export through [`MetricsHandle::render`]

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
