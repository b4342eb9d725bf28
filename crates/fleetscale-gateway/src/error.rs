//! Gateway error types.

use thiserror::Error;

/// Result type alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors a gateway call can return.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The metric query returned no datapoints (e.g. a brand new cluster).
    #[error("no datapoints for {metric} on {target}")]
    MetricUnavailable { metric: String, target: String },

    #[error("auto scaling group for {0} not found")]
    GroupNotFound(String),

    #[error("{action} {target} failed: {reason}")]
    ActionFailed {
        action: String,
        target: String,
        reason: String,
    },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("fixture error: {0}")]
    Fixture(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    pub fn action_failed(action: &str, target: &str, reason: impl Into<String>) -> Self {
        Self::ActionFailed {
            action: action.to_string(),
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}
