//! Action sinks: where decided actions go.
//!
//! The same submission routine runs in both modes; only the sink differs.
//! `ExecutingSink` forwards to the action gateway, `ReportingSink` records
//! what would have been done.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use fleetscale_core::{ClusterRef, RunMode};
use fleetscale_engine::{DecisionResult, DrainProposal, TerminateProposal};
use fleetscale_gateway::{ActionGateway, GatewayFuture};

use crate::diagnostics::{DiagnosticKind, RunLog};
use crate::with_timeout;

/// Destination for drain and terminate proposals.
pub trait ActionSink: Send + Sync {
    fn mode(&self) -> RunMode;

    /// Returns a short description of what happened.
    fn drain<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a DrainProposal,
    ) -> GatewayFuture<'a, String>;

    fn terminate<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a TerminateProposal,
    ) -> GatewayFuture<'a, String>;
}

/// Sends actions to the action gateway. A call running past `timeout`
/// fails with `GatewayError::Timeout`.
pub struct ExecutingSink {
    gateway: Arc<dyn ActionGateway>,
    timeout: Duration,
}

impl ExecutingSink {
    pub fn new(gateway: Arc<dyn ActionGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }
}

impl ActionSink for ExecutingSink {
    fn mode(&self) -> RunMode {
        RunMode::Normal
    }

    fn drain<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a DrainProposal,
    ) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            info!(
                cluster = %cluster.name,
                instance = %proposal.instance_id,
                reason = %proposal.reason,
                "draining instance"
            );
            with_timeout(
                "drain container instance",
                self.timeout,
                self.gateway.drain(cluster, &proposal.handle),
            )
            .await?;
            Ok(format!("drained {} ({})", proposal.instance_id, proposal.reason))
        })
    }

    fn terminate<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a TerminateProposal,
    ) -> GatewayFuture<'a, String> {
        Box::pin(async move {
            info!(
                cluster = %cluster.name,
                instance = %proposal.instance_id,
                "terminating drained instance with no tasks"
            );
            with_timeout(
                "terminate instance",
                self.timeout,
                self.gateway.terminate_and_decrement(&proposal.instance_id),
            )
            .await
        })
    }
}

/// Records proposals without touching the fleet.
#[derive(Default)]
pub struct ReportingSink {
    reported: Mutex<Vec<String>>,
}

impl ReportingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far, in submission order.
    pub fn reported(&self) -> Vec<String> {
        self.reported
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn report(&self, line: String) -> String {
        if let Ok(mut reported) = self.reported.lock() {
            reported.push(line.clone());
        }
        line
    }
}

impl ActionSink for ReportingSink {
    fn mode(&self) -> RunMode {
        RunMode::DryRun
    }

    fn drain<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a DrainProposal,
    ) -> GatewayFuture<'a, String> {
        info!(
            cluster = %cluster.name,
            instance = %proposal.instance_id,
            reason = %proposal.reason,
            "would have drained"
        );
        let line = self.report(format!(
            "would have drained {} ({})",
            proposal.instance_id, proposal.reason
        ));
        Box::pin(std::future::ready(Ok(line)))
    }

    fn terminate<'a>(
        &'a self,
        cluster: &'a ClusterRef,
        proposal: &'a TerminateProposal,
    ) -> GatewayFuture<'a, String> {
        info!(
            cluster = %cluster.name,
            instance = %proposal.instance_id,
            "would have terminated"
        );
        let line = self.report(format!("would have terminated {}", proposal.instance_id));
        Box::pin(std::future::ready(Ok(line)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Drain,
    Terminate,
}

/// Result of one submitted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub instance_id: String,
    pub succeeded: bool,
    pub message: String,
}

/// Submit every action of `decision` to `sink`: drains in decision order,
/// then terminations. A failed action is logged and the next one proceeds.
pub async fn submit_decision(
    sink: &dyn ActionSink,
    cluster: &ClusterRef,
    decision: &DecisionResult,
    log: &RunLog,
) -> Vec<ActionRecord> {
    let dry_run = sink.mode().is_dry_run();
    let mut records = Vec::with_capacity(decision.drains.len() + decision.terminations.len());

    for proposal in &decision.drains {
        let outcome = sink.drain(cluster, proposal).await;
        let kind = if dry_run {
            DiagnosticKind::WouldDrain
        } else {
            DiagnosticKind::Drain
        };
        records.push(record_outcome(
            log,
            cluster,
            ActionKind::Drain,
            &proposal.instance_id,
            kind,
            outcome,
        ));
    }

    for proposal in &decision.terminations {
        let outcome = sink.terminate(cluster, proposal).await;
        let kind = if dry_run {
            DiagnosticKind::WouldTerminate
        } else {
            DiagnosticKind::Terminate
        };
        records.push(record_outcome(
            log,
            cluster,
            ActionKind::Terminate,
            &proposal.instance_id,
            kind,
            outcome,
        ));
    }

    records
}

fn record_outcome(
    log: &RunLog,
    cluster: &ClusterRef,
    action: ActionKind,
    instance_id: &str,
    kind: DiagnosticKind,
    outcome: fleetscale_gateway::GatewayResult<String>,
) -> ActionRecord {
    match outcome {
        Ok(message) => {
            log.record(&cluster.name, kind, message.clone());
            ActionRecord {
                kind: action,
                instance_id: instance_id.to_string(),
                succeeded: true,
                message,
            }
        }
        Err(e) => {
            warn!(
                cluster = %cluster.name,
                instance = %instance_id,
                error = %e,
                "action submission failed"
            );
            log.record(&cluster.name, DiagnosticKind::ActionFailed, e.to_string());
            ActionRecord {
                kind: action,
                instance_id: instance_id.to_string(),
                succeeded: false,
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscale_engine::{DrainReason, TerminateReason};
    use fleetscale_gateway::memory::ClusterFixture;
    use fleetscale_gateway::{FleetAction, FleetState, MemoryFleet};

    fn decision() -> DecisionResult {
        let mut d = empty_decision();
        d.drains.push(DrainProposal {
            instance_id: "i-1".to_string(),
            handle: "ci/i-1".to_string(),
            reason: DrainReason::Idle,
        });
        d.drains.push(DrainProposal {
            instance_id: "i-2".to_string(),
            handle: "ci/i-2".to_string(),
            reason: DrainReason::LeastUtilized,
        });
        d.terminations.push(TerminateProposal {
            instance_id: "i-9".to_string(),
            reason: TerminateReason::DrainedAndEmpty,
        });
        d
    }

    fn empty_decision() -> DecisionResult {
        DecisionResult {
            cluster: "web".to_string(),
            drains: vec![],
            terminations: vec![],
            rationale: vec![],
            remaining_budget: 0,
            projected_reservation: None,
        }
    }

    #[tokio::test]
    async fn reporting_sink_never_touches_fleet() {
        let sink = ReportingSink::new();
        let log = RunLog::new();
        let cluster = ClusterRef::from_arn("cluster/web");

        let records = submit_decision(&sink, &cluster, &decision(), &log).await;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.succeeded));
        assert_eq!(
            sink.reported(),
            vec![
                "would have drained i-1 (idle)",
                "would have drained i-2 (least-utilized)",
                "would have terminated i-9",
            ]
        );
        let kinds: Vec<_> = log.entries().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::WouldDrain,
                DiagnosticKind::WouldDrain,
                DiagnosticKind::WouldTerminate
            ]
        );
    }

    #[tokio::test]
    async fn failed_action_does_not_stop_the_rest() {
        let fleet = MemoryFleet::new(FleetState {
            clusters: vec![ClusterFixture {
                arn: "cluster/web".to_string(),
                memory_reservation: Some(10.0),
                active: vec![
                    fleetscale_core::ActiveInstance {
                        id: "i-1".to_string(),
                        running_tasks: 0,
                        pending_tasks: 0,
                        free_memory: 100,
                        handle: "ci/i-1".to_string(),
                    },
                    fleetscale_core::ActiveInstance {
                        id: "i-2".to_string(),
                        running_tasks: 1,
                        pending_tasks: 0,
                        free_memory: 100,
                        handle: "ci/i-2".to_string(),
                    },
                ],
                draining: vec![],
            }],
            groups: vec![],
        });
        fleet.fail_actions_for("ci/i-1");

        let sink = ExecutingSink::new(Arc::new(fleet.clone()), Duration::from_secs(5));
        let log = RunLog::new();
        let cluster = ClusterRef::from_arn("cluster/web");

        let records = submit_decision(&sink, &cluster, &decision(), &log).await;

        assert!(!records[0].succeeded);
        assert!(records[1].succeeded);
        // i-9 belongs to no group: tolerated as already terminated.
        assert!(records[2].succeeded);
        assert_eq!(
            fleet.actions(),
            vec![FleetAction::Drain {
                cluster: "web".to_string(),
                handle: "ci/i-2".to_string(),
            }]
        );
        assert_eq!(log.entries()[0].kind, DiagnosticKind::ActionFailed);
    }

    struct StuckGateway;

    impl ActionGateway for StuckGateway {
        fn drain<'a>(&'a self, _cluster: &'a ClusterRef, _handle: &'a str) -> GatewayFuture<'a, ()> {
            Box::pin(std::future::pending())
        }

        fn terminate_and_decrement<'a>(&'a self, _instance_id: &'a str) -> GatewayFuture<'a, String> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn stuck_actions_time_out() {
        let sink = ExecutingSink::new(Arc::new(StuckGateway), Duration::from_millis(50));
        let log = RunLog::new();
        let cluster = ClusterRef::from_arn("cluster/web");

        let records = submit_decision(&sink, &cluster, &decision(), &log).await;

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.succeeded));
        assert!(records[0].message.contains("drain container instance timed out"));
        assert!(records[2].message.contains("terminate instance timed out"));
        assert_eq!(log.len(), 3);
    }

}
