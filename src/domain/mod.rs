//! Domain layer containing the metric model and registry
//!
//! This module holds the core entities of the exporter: gauge descriptors,
//! samples, snapshots and the thread-safe registry shared between the
//! sampling loop and the scrape handler.

/// Thread-safe metric registry and gauge model
pub mod registry;
/// Core types and errors
pub mod types;

pub use registry::*;
pub use types::*;
