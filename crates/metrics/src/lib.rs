//! Metrics for the aggregator media pipeline.
//!
//! Names and label keys live in [`media`] and [`labels`]; record them through
//! the re-exported `metrics` facade macros. When the `prometheus` feature is
//! enabled, [`init_metrics`] installs a Prometheus recorder whose output
//! [`MetricsHandle::render`] returns.
//!
//! ```rust,ignore
//! use aggregator_metrics::{counter, media};
//!
//! counter!(media::STRATEGY_ATTEMPTS_TOTAL, "strategy" => "fast_sideload").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, histogram};
