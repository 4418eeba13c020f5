//! Utilities for logging

/// Tracing subscriber setup
pub mod logger;

pub use logger::*;
