//! Infrastructure layer providing device access, sampling and export
//!
//! This module contains the components surrounding the domain registry:
//! the OBD-II device client, the fixed-interval sampling loop, and the
//! Prometheus exposition endpoint.

/// Prometheus exposition rendering and HTTP serving
pub mod exporter;
/// OBD-II device client and command set
pub mod obd;
/// Fixed-interval sampling loop
pub mod sampler;

pub use exporter::*;
pub use sampler::*;
