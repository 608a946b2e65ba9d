//! Metrics export.
//!
//! Pushes the leaf certificate's expiry to a Prometheus Push Gateway after
//! an inspection.
//!
//! # Submodules
//!
//! - `prom` - Prometheus metrics integration

pub mod prom;
