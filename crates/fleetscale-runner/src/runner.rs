//! Runner: one decision pass over every cluster, and the scheduled loop.
//!
//! Clusters are evaluated concurrently (bounded by a semaphore). Each
//! cluster task assembles its snapshot, asks the engine for a decision and
//! submits the actions in order. Nothing a cluster task does can abort
//! another one; every failure ends up in the run log.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use fleetscale_core::{ClusterRef, GroupDescriptor, RunMode, ScaleConfig};
use fleetscale_engine::{DecisionResult, ScalingEngine, Thresholds};
use fleetscale_gateway::{ActionGateway, FleetGateway, MetricsGateway};

use crate::assemble::{Assembler, AssemblyOutcome};
use crate::diagnostics::{DiagnosticEntry, DiagnosticKind, RunLog};
use crate::sink::{ActionRecord, ActionSink, ExecutingSink, ReportingSink, submit_decision};
use crate::with_timeout;

/// What happened to one cluster in a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusterStatus {
    Evaluated {
        decision: DecisionResult,
        actions: Vec<ActionRecord>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterOutcome {
    pub cluster: String,
    #[serde(flatten)]
    pub status: ClusterStatus,
}

impl ClusterOutcome {
    pub fn decision(&self) -> Option<&DecisionResult> {
        match &self.status {
            ClusterStatus::Evaluated { decision, .. } => Some(decision),
            _ => None,
        }
    }

    pub fn actions(&self) -> &[ActionRecord] {
        match &self.status {
            ClusterStatus::Evaluated { actions, .. } => actions,
            _ => &[],
        }
    }
}

/// Summary of one pass, in cluster discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub outcomes: Vec<ClusterOutcome>,
    pub log: Vec<DiagnosticEntry>,
}

impl RunReport {
    pub fn outcome(&self, cluster: &str) -> Option<&ClusterOutcome> {
        self.outcomes.iter().find(|o| o.cluster == cluster)
    }
}

/// Everything a cluster task needs, cheap to clone into the task.
#[derive(Clone)]
struct ClusterContext {
    fleet: Arc<dyn FleetGateway>,
    metrics: Arc<dyn MetricsGateway>,
    sink: Arc<dyn ActionSink>,
    engine: ScalingEngine,
    groups: Arc<Vec<GroupDescriptor>>,
    tag_key: Arc<str>,
    timeout: Duration,
    log: RunLog,
}

pub struct Runner {
    fleet: Arc<dyn FleetGateway>,
    metrics: Arc<dyn MetricsGateway>,
    actions: Arc<dyn ActionGateway>,
    engine: ScalingEngine,
    config: ScaleConfig,
}

impl Runner {
    pub fn new(
        fleet: Arc<dyn FleetGateway>,
        metrics: Arc<dyn MetricsGateway>,
        actions: Arc<dyn ActionGateway>,
        config: ScaleConfig,
    ) -> Self {
        let engine = ScalingEngine::new(Thresholds::from(&config));
        Self {
            fleet,
            metrics,
            actions,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &ScaleConfig {
        &self.config
    }

    /// Sink for `mode`. The decision path is the same either way.
    pub fn sink_for(&self, mode: RunMode) -> Arc<dyn ActionSink> {
        match mode {
            RunMode::Normal => Arc::new(ExecutingSink::new(
                Arc::clone(&self.actions),
                Duration::from_secs(self.config.gateway_timeout_secs),
            )),
            RunMode::DryRun => Arc::new(ReportingSink::new()),
        }
    }

    /// One pass in the configured mode.
    pub async fn run_once(&self) -> RunReport {
        self.run_once_with(self.sink_for(self.config.run_mode())).await
    }

    /// One pass, submitting through `sink`.
    pub async fn run_once_with(&self, sink: Arc<dyn ActionSink>) -> RunReport {
        let mode = sink.mode();
        let log = RunLog::new();
        let timeout = Duration::from_secs(self.config.gateway_timeout_secs);

        info!(?mode, "scale-in pass starting");

        let clusters = match with_timeout("list clusters", timeout, self.fleet.list_clusters()).await
        {
            Ok(clusters) => clusters,
            Err(e) => {
                error!(error = %e, "cluster enumeration failed");
                log.record_run(DiagnosticKind::RunFailed, e.to_string());
                return finish(mode, Vec::new(), &log);
            }
        };

        if clusters.is_empty() {
            info!("no clusters found");
            log.record_run(DiagnosticKind::NoClusters, "no clusters found");
            return finish(mode, Vec::new(), &log);
        }

        let clusters: Vec<ClusterRef> = clusters
            .into_iter()
            .filter(|c| {
                let keep = self.config.includes_cluster(&c.arn);
                if !keep {
                    debug!(cluster = %c.name, "excluded by avoid substring");
                    log.record(
                        &c.name,
                        DiagnosticKind::ClusterExcluded,
                        format!("arn contains {:?}", self.config.cluster_avoid_substring),
                    );
                }
                keep
            })
            .collect();

        let groups = match with_timeout(
            "describe auto scaling groups",
            timeout,
            self.fleet.auto_scaling_groups(),
        )
        .await
        {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "auto scaling group listing failed");
                log.record_run(DiagnosticKind::RunFailed, e.to_string());
                return finish(mode, Vec::new(), &log);
            }
        };

        let ctx = ClusterContext {
            fleet: Arc::clone(&self.fleet),
            metrics: Arc::clone(&self.metrics),
            sink,
            engine: self.engine.clone(),
            groups: Arc::new(groups),
            tag_key: Arc::from(self.config.group_tag_key.as_str()),
            timeout,
            log: log.clone(),
        };

        let permits = Arc::new(Semaphore::new(self.config.max_parallel_clusters.max(1)));
        let mut tasks = JoinSet::new();

        for (index, cluster) in clusters.iter().cloned().enumerate() {
            let ctx = ctx.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, evaluate_cluster(&ctx, &cluster).await)
            });
        }

        let mut outcomes: Vec<Option<ClusterOutcome>> = vec![None; clusters.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => {
                    error!(error = %e, "cluster task aborted");
                    log.record_run(DiagnosticKind::RunFailed, format!("cluster task aborted: {e}"));
                }
            }
        }

        let outcomes = outcomes
            .into_iter()
            .zip(&clusters)
            .map(|(outcome, cluster)| {
                outcome.unwrap_or_else(|| ClusterOutcome {
                    cluster: cluster.name.clone(),
                    status: ClusterStatus::Failed {
                        error: "cluster task aborted".to_string(),
                    },
                })
            })
            .collect();

        finish(mode, outcomes, &log)
    }

    /// Run a pass every `interval` until `shutdown` flips.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "scale-in loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.run_once().await;
                }
                _ = shutdown.changed() => {
                    info!("scale-in loop shutting down");
                    break;
                }
            }
        }
    }
}

fn finish(mode: RunMode, outcomes: Vec<ClusterOutcome>, log: &RunLog) -> RunReport {
    info!(
        ?mode,
        clusters = outcomes.len(),
        run_log = %log.to_json_line(),
        "scale-in pass complete"
    );
    RunReport {
        mode,
        outcomes,
        log: log.entries(),
    }
}

async fn evaluate_cluster(ctx: &ClusterContext, cluster: &ClusterRef) -> ClusterOutcome {
    let name = cluster.name.as_str();
    let assembler = Assembler {
        fleet: ctx.fleet.as_ref(),
        metrics: ctx.metrics.as_ref(),
        groups: &ctx.groups,
        tag_key: &ctx.tag_key,
        timeout: ctx.timeout,
    };

    let skipped = |kind: DiagnosticKind, reason: String| {
        ctx.log.record(name, kind, reason.clone());
        ClusterOutcome {
            cluster: name.to_string(),
            status: ClusterStatus::Skipped { reason },
        }
    };

    let snapshot = match assembler.assemble(cluster).await {
        AssemblyOutcome::Ready(snapshot) => snapshot,
        AssemblyOutcome::NoActiveInstances => {
            info!(cluster = %name, "no active instances in cluster");
            return skipped(
                DiagnosticKind::NoActiveInstances,
                "no active instances in cluster".to_string(),
            );
        }
        AssemblyOutcome::MetricUnavailable(e) => {
            warn!(cluster = %name, error = %e, "could not retrieve memory reservation");
            return skipped(
                DiagnosticKind::MetricUnavailable,
                format!("could not retrieve memory reservation for {name}: {e}"),
            );
        }
        AssemblyOutcome::GroupNotFound => {
            warn!(cluster = %name, "auto scaling group not found");
            return skipped(
                DiagnosticKind::GroupNotFound,
                format!("auto scaling group for {name} not found"),
            );
        }
        AssemblyOutcome::Failed(error) => {
            warn!(cluster = %name, %error, "cluster evaluation failed");
            ctx.log.record(name, DiagnosticKind::ClusterFailed, error.clone());
            return ClusterOutcome {
                cluster: name.to_string(),
                status: ClusterStatus::Failed { error },
            };
        }
    };

    if snapshot.group_cpu.is_none() {
        ctx.log.record(
            name,
            DiagnosticKind::MetricUnavailable,
            format!("no cpu datapoints for group {}", snapshot.bounds.group),
        );
    }

    let decision = ctx.engine.evaluate(&snapshot);
    for line in &decision.rationale {
        debug!(cluster = %name, "{line}");
    }
    if let Some(candidate) = decision
        .drains
        .iter()
        .find(|d| d.reason == fleetscale_engine::DrainReason::LeastUtilized)
    {
        ctx.log.record(
            name,
            DiagnosticKind::ScaleCandidate,
            format!("{} selected as least utilized", candidate.instance_id),
        );
    }
    ctx.log.record(
        name,
        DiagnosticKind::Decision,
        format!(
            "{} drain(s), {} termination(s), budget left {}",
            decision.drains.len(),
            decision.terminations.len(),
            decision.remaining_budget
        ),
    );

    let actions = submit_decision(ctx.sink.as_ref(), cluster, &decision, &ctx.log).await;

    ClusterOutcome {
        cluster: name.to_string(),
        status: ClusterStatus::Evaluated { decision, actions },
    }
}
