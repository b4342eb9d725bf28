//! Scaling configuration.
//!
//! Layered as defaults → optional TOML file → environment variables.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const ENV_SCALE_IN_CPU_TH: &str = "SCALE_IN_CPU_TH";
pub const ENV_SCALE_IN_MEM_TH: &str = "SCALE_IN_MEM_TH";
pub const ENV_FUTURE_MEM_TH: &str = "FUTURE_MEM_TH";
pub const ENV_AVOID_STR: &str = "ECS_AVOID_STR";
pub const ENV_DRY_RUN: &str = "DRY_RUN";
pub const ENV_MAX_PARALLEL: &str = "FLEETSCALE_MAX_PARALLEL";
pub const ENV_GATEWAY_TIMEOUT: &str = "FLEETSCALE_GATEWAY_TIMEOUT_SECS";
pub const ENV_GROUP_TAG: &str = "FLEETSCALE_GROUP_TAG";

/// Whether proposed actions are executed or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Normal,
    DryRun,
}

impl RunMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Normal }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    /// Group CPU average must be below this for a least-utilized drain.
    pub scale_in_cpu_threshold: f64,
    /// Memory reservation must be below this for a least-utilized drain.
    pub scale_in_mem_threshold: f64,
    /// No drain at all when current or projected reservation reaches this.
    pub future_mem_threshold: f64,
    /// Clusters whose ARN contains this substring are ignored.
    pub cluster_avoid_substring: String,
    pub dry_run: bool,
    /// Upper bound on clusters evaluated concurrently.
    pub max_parallel_clusters: usize,
    /// Per gateway call timeout.
    pub gateway_timeout_secs: u64,
    /// Tag key whose value names the cluster a group backs.
    pub group_tag_key: String,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            scale_in_cpu_threshold: 25.0,
            scale_in_mem_threshold: 75.0,
            future_mem_threshold: 85.0,
            cluster_avoid_substring: "awseb".to_string(),
            dry_run: false,
            max_parallel_clusters: 4,
            gateway_timeout_secs: 30,
            group_tag_key: "aws:cloudformation:stack-name".to_string(),
        }
    }
}

impl ScaleConfig {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScaleConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from `lookup` (normally `std::env::var`).
    ///
    /// `DRY_RUN` enables dry-run by presence alone, whatever its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_SCALE_IN_CPU_TH) {
            self.scale_in_cpu_threshold = parse_value(ENV_SCALE_IN_CPU_TH, &v)?;
        }
        if let Some(v) = lookup(ENV_SCALE_IN_MEM_TH) {
            self.scale_in_mem_threshold = parse_value(ENV_SCALE_IN_MEM_TH, &v)?;
        }
        if let Some(v) = lookup(ENV_FUTURE_MEM_TH) {
            self.future_mem_threshold = parse_value(ENV_FUTURE_MEM_TH, &v)?;
        }
        if let Some(v) = lookup(ENV_AVOID_STR) {
            self.cluster_avoid_substring = v;
        }
        if lookup(ENV_DRY_RUN).is_some() {
            self.dry_run = true;
        }
        if let Some(v) = lookup(ENV_MAX_PARALLEL) {
            self.max_parallel_clusters = parse_value(ENV_MAX_PARALLEL, &v)?;
        }
        if let Some(v) = lookup(ENV_GATEWAY_TIMEOUT) {
            self.gateway_timeout_secs = parse_value(ENV_GATEWAY_TIMEOUT, &v)?;
        }
        if let Some(v) = lookup(ENV_GROUP_TAG) {
            self.group_tag_key = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [
            (ENV_SCALE_IN_CPU_TH, self.scale_in_cpu_threshold),
            (ENV_SCALE_IN_MEM_TH, self.scale_in_mem_threshold),
            (ENV_FUTURE_MEM_TH, self.future_mem_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    key: key.to_string(),
                    value,
                });
            }
        }
        if self.max_parallel_clusters == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MAX_PARALLEL.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::from_dry_run(self.dry_run)
    }

    /// Whether a cluster should be considered at all.
    pub fn includes_cluster(&self, arn: &str) -> bool {
        self.cluster_avoid_substring.is_empty() || !arn.contains(&self.cluster_avoid_substring)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
