//! Error types for snapshot construction and configuration loading.

use thiserror::Error;

/// Result type alias for snapshot construction.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors raised while assembling a [`crate::ClusterSnapshot`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("group {group}: desired capacity {desired_capacity} below min size {min_size}")]
    InvalidBounds {
        group: String,
        min_size: u32,
        desired_capacity: u32,
    },

    #[error("cluster {cluster}: instance {instance} reported both active and draining")]
    InstanceInBothStates { cluster: String, instance: String },
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading [`crate::ScaleConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{key} must be within 0..=100, got {value}")]
    OutOfRange { key: String, value: f64 },
}
