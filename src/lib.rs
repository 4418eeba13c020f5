//! # OBD Prometheus Exporter
//!
//! Samples live OBD-II readings from a vehicle over an ELM327 serial
//! adapter and exposes the most recent values to Prometheus through a
//! plain-text scrape endpoint.
//!
//! ## Architecture
//!
//! Three components communicate only through a shared registry:
//!
//! - **Domain**: gauge model and the thread-safe [`MetricRegistry`]
//! - **Infrastructure**: OBD device client, sampling loop, HTTP exporter
//! - **Binary**: wiring, configuration and graceful shutdown
//!
//! ## Thread Safety
//!
//! The registry is the sole shared-mutable boundary between the sampler
//! task and scrape requests. A coarse `std::sync::RwLock` guards it: the
//! write rate is a handful of updates per second, every snapshot is
//! consistent, and no reader ever observes a half-applied write.

/// Command-line and environment configuration
pub mod cli;
pub mod domain;
pub mod infrastructure;

/// Utilities for logging
pub mod utils;

// Re-export commonly used types for convenience
pub use domain::{
    registry::{Gauge, MetricRegistry, MetricSnapshot, Sample},
    types::{labels, LabelSet, RegistryError, RegistryResult},
};

pub use infrastructure::{
    exporter::{render_exposition, routes, serve, MetricsHandler, EXPOSITION_CONTENT_TYPE},
    obd::{
        Elm327Client, Measurement, ObdClient, ObdCommand, ObdError, ObdResult, ScriptedClient,
        Unit,
    },
    sampler::{register_gauges, standard_readings, Reading, Sampler, SamplerStats},
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
