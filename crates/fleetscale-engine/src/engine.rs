//! Scaling engine. Turns a cluster snapshot into drain and terminate
//! proposals.
//!
//! Rules run in a fixed order: eligibility, idle drains, least-utilized
//! drain, then termination of drained-and-empty instances. Each rule records
//! a line in the rationale whether or not it fired.

use tracing::debug;

use fleetscale_core::{ClusterSnapshot, ScaleConfig};

use crate::decision::{
    DecisionResult, DrainProposal, DrainReason, TerminateProposal, TerminateReason,
};
use crate::eligibility::{ScaleBudget, at_floor, scalable_count};
use crate::projector::project_reservation;
use crate::selector::{idle_instances, least_utilized};

/// Percentage ceilings the engine compares against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Group CPU must be below this for a least-utilized drain.
    pub scale_in_cpu: f64,
    /// Reservation must be below this for a least-utilized drain.
    pub scale_in_mem: f64,
    /// Current and projected reservation must stay below this for any drain.
    pub future_mem: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&ScaleConfig::default())
    }
}

impl From<&ScaleConfig> for Thresholds {
    fn from(config: &ScaleConfig) -> Self {
        Self {
            scale_in_cpu: config.scale_in_cpu_threshold,
            scale_in_mem: config.scale_in_mem_threshold,
            future_mem: config.future_mem_threshold,
        }
    }
}

/// Stateless decision engine. One instance can evaluate any number of
/// snapshots, concurrently.
#[derive(Debug, Clone, Default)]
pub struct ScalingEngine {
    thresholds: Thresholds,
}

impl ScalingEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate one cluster.
    pub fn evaluate(&self, snapshot: &ClusterSnapshot) -> DecisionResult {
        let mut result = DecisionResult::new(snapshot.name());
        let bounds = &snapshot.bounds;

        if at_floor(bounds) {
            result.note(format!(
                "group {} at min size {}, skipping",
                bounds.group,
                bounds.min_size()
            ));
            let empty = snapshot.draining.iter().filter(|d| d.is_empty()).count();
            if empty > 0 {
                result.note(format!(
                    "{empty} drained-and-empty instance(s) left: terminating would go below min size"
                ));
            }
            debug!(cluster = %snapshot.name(), "at floor");
            return result;
        }

        let mut budget = ScaleBudget::new(scalable_count(bounds, snapshot.draining.len()));
        result.note(format!(
            "{} instance(s) can be scaled ({} headroom, {} draining)",
            budget.remaining(),
            bounds.headroom(),
            snapshot.draining.len()
        ));

        self.propose_drains(snapshot, &mut budget, &mut result);
        self.propose_terminations(snapshot, &mut result);

        result.remaining_budget = budget.remaining();
        debug!(
            cluster = %snapshot.name(),
            drains = result.drains.len(),
            terminations = result.terminations.len(),
            remaining_budget = result.remaining_budget,
            "decision complete"
        );
        result
    }

    fn propose_drains(
        &self,
        snapshot: &ClusterSnapshot,
        budget: &mut ScaleBudget,
        result: &mut DecisionResult,
    ) {
        let current = snapshot.memory_reservation;
        let projected = project_reservation(current, snapshot.active.len());
        result.projected_reservation = Some(projected);
        result.note(format!(
            "reservation current {current:.2}, projected {projected:.2}"
        ));

        if budget.is_exhausted() {
            result.note("no scalable budget, no drains");
            return;
        }
        if current >= self.thresholds.future_mem || projected >= self.thresholds.future_mem {
            result.note(format!(
                "reservation would reach future threshold {}, no drains",
                self.thresholds.future_mem
            ));
            return;
        }

        for inst in idle_instances(&snapshot.active) {
            if !budget.take() {
                result.note("minimum state reached, cannot drain another idle instance");
                break;
            }
            result.note(format!("draining idle instance {}", inst.id));
            result.drains.push(DrainProposal {
                instance_id: inst.id.clone(),
                handle: inst.handle.clone(),
                reason: DrainReason::Idle,
            });
        }

        if current >= self.thresholds.scale_in_mem {
            result.note(format!(
                "reservation {current:.2} not below scale-in threshold {}",
                self.thresholds.scale_in_mem
            ));
            return;
        }

        let cpu = match snapshot.group_cpu {
            Some(cpu) if cpu < self.thresholds.scale_in_cpu => cpu,
            Some(cpu) => {
                result.note(format!(
                    "cpu {cpu:.2} not below threshold {}, cannot scale",
                    self.thresholds.scale_in_cpu
                ));
                return;
            }
            None => {
                result.note("cpu unknown, skipping least-utilized drain");
                return;
            }
        };

        if budget.is_exhausted() {
            result.note("minimum state reached, cannot drain least-utilized instance");
            return;
        }

        let remaining = snapshot
            .active
            .iter()
            .filter(|i| !result.drains.iter().any(|d| d.instance_id == i.id));

        let Some(candidate) = least_utilized(remaining) else {
            result.note("no remaining active instance to drain");
            return;
        };

        budget.take();
        result.note(format!(
            "draining least-utilized instance {} (free memory {}, {} running, cpu {cpu:.2})",
            candidate.id, candidate.free_memory, candidate.running_tasks
        ));
        result.drains.push(DrainProposal {
            instance_id: candidate.id.clone(),
            handle: candidate.handle.clone(),
            reason: DrainReason::LeastUtilized,
        });
    }

    fn propose_terminations(&self, snapshot: &ClusterSnapshot, result: &mut DecisionResult) {
        // Each termination also decrements desired capacity.
        let mut allowance = ScaleBudget::new(snapshot.bounds.headroom());

        for inst in &snapshot.draining {
            if !inst.is_empty() {
                result.note(format!(
                    "draining instance {} not empty ({} tasks)",
                    inst.id, inst.task_count
                ));
                continue;
            }
            if !allowance.take() {
                result.note(format!(
                    "draining instance {} empty but group at min size",
                    inst.id
                ));
                continue;
            }
            result.note(format!("terminating drained instance {}", inst.id));
            result.terminations.push(TerminateProposal {
                instance_id: inst.id.clone(),
                reason: TerminateReason::DrainedAndEmpty,
            });
        }
    }
}
