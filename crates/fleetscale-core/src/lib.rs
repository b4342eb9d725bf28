//! fleetscale-core — shared types for the fleet rightsizing loop.
//!
//! Holds the per-pass snapshot model consumed by the decision engine and the
//! `ScaleConfig` loaded by the daemon. No I/O beyond reading a config file.

pub mod config;
pub mod error;
pub mod types;

pub use config::{RunMode, ScaleConfig};
pub use error::{ConfigError, ConfigResult, SnapshotError, SnapshotResult};
pub use types::*;
