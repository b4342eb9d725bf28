//! Trigger event payload for event-based invocation.

use serde::Deserialize;

use fleetscale_core::{RunMode, ScaleConfig};

/// Inbound event. Any JSON object is accepted; only `dry_run` is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TriggerEvent {
    /// Parse a payload. Empty input is an empty event.
    pub fn parse(payload: &str) -> serde_json::Result<Self> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(payload)
    }

    /// Mode for this invocation: the event's own flag if present, otherwise
    /// the configured one (itself derived from `DRY_RUN`).
    pub fn run_mode(&self, config: &ScaleConfig) -> RunMode {
        RunMode::from_dry_run(self.dry_run.unwrap_or(config.dry_run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_defers_to_config() {
        let event = TriggerEvent::parse("").unwrap();
        let config = ScaleConfig {
            dry_run: true,
            ..Default::default()
        };
        assert_eq!(event.run_mode(&config), RunMode::DryRun);
        assert_eq!(event.run_mode(&ScaleConfig::default()), RunMode::Normal);
    }

    #[test]
    fn event_flag_overrides() {
        let event = TriggerEvent::parse(r#"{"source":"aws.events","dry_run":true}"#).unwrap();
        assert_eq!(event.run_mode(&ScaleConfig::default()), RunMode::DryRun);
        assert_eq!(event.extra["source"], "aws.events");
    }

    #[test]
    fn non_object_payload_rejected() {
        assert!(TriggerEvent::parse("[1, 2]").is_err());
    }
}
