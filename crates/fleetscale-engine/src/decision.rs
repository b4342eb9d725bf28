//! Output of a decision pass.

use std::fmt;

use serde::Serialize;

use fleetscale_core::{InstanceHandle, InstanceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainReason {
    Idle,
    LeastUtilized,
}

impl fmt::Display for DrainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::LeastUtilized => f.write_str("least-utilized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminateReason {
    DrainedAndEmpty,
}

impl fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DrainedAndEmpty => f.write_str("drained-and-empty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainProposal {
    pub instance_id: InstanceId,
    pub handle: InstanceHandle,
    pub reason: DrainReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminateProposal {
    pub instance_id: InstanceId,
    pub reason: TerminateReason,
}

/// Everything decided for one cluster in one pass.
///
/// Drains are ordered idle first, then least-utilized. Terminations follow
/// drains when submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionResult {
    pub cluster: String,
    pub drains: Vec<DrainProposal>,
    pub terminations: Vec<TerminateProposal>,
    /// Human-readable trail of why each rule did or did not fire.
    pub rationale: Vec<String>,
    /// Drain budget left when the pass finished.
    pub remaining_budget: u32,
    pub projected_reservation: Option<f64>,
}

impl DecisionResult {
    pub(crate) fn new(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            drains: Vec::new(),
            terminations: Vec::new(),
            rationale: Vec::new(),
            remaining_budget: 0,
            projected_reservation: None,
        }
    }

    pub(crate) fn note(&mut self, line: impl Into<String>) {
        self.rationale.push(line.into());
    }

    pub fn is_noop(&self) -> bool {
        self.drains.is_empty() && self.terminations.is_empty()
    }

    pub fn drained_ids(&self) -> impl Iterator<Item = &str> {
        self.drains.iter().map(|d| d.instance_id.as_str())
    }
}
