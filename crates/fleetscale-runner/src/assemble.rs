//! Snapshot assembly. The only place that talks to the read-side gateways.
//!
//! Resolves a cluster's owning auto-scaling group by tag once, so the engine
//! receives bounds directly and never matches names itself.

use std::time::Duration;

use tracing::debug;

use fleetscale_core::{ClusterRef, ClusterSnapshot, GroupDescriptor};
use fleetscale_gateway::{FleetGateway, GatewayError, GatewayResult, MetricsGateway};

use crate::with_timeout;

/// Why a cluster produced no snapshot this pass.
#[derive(Debug)]
pub enum AssemblyOutcome {
    Ready(Box<ClusterSnapshot>),
    NoActiveInstances,
    MetricUnavailable(GatewayError),
    GroupNotFound,
    Failed(String),
}

/// Find the group whose `tag_key` tag value contains the cluster name.
/// The first match in provider order wins.
pub fn resolve_group<'g>(
    cluster: &ClusterRef,
    groups: &'g [GroupDescriptor],
    tag_key: &str,
) -> Option<&'g GroupDescriptor> {
    groups.iter().find(|g| g.tagged_for(tag_key, &cluster.name))
}

/// Read-side gateways plus the settings assembly needs.
pub struct Assembler<'a> {
    pub fleet: &'a dyn FleetGateway,
    pub metrics: &'a dyn MetricsGateway,
    pub groups: &'a [GroupDescriptor],
    pub tag_key: &'a str,
    pub timeout: Duration,
}

impl Assembler<'_> {
    pub async fn assemble(&self, cluster: &ClusterRef) -> AssemblyOutcome {
        match self.try_assemble(cluster).await {
            Ok(outcome) => outcome,
            Err(e) => AssemblyOutcome::Failed(e.to_string()),
        }
    }

    async fn try_assemble(&self, cluster: &ClusterRef) -> GatewayResult<AssemblyOutcome> {
        let active = with_timeout(
            "list active container instances",
            self.timeout,
            self.fleet.active_instances(cluster),
        )
        .await?;
        if active.is_empty() {
            return Ok(AssemblyOutcome::NoActiveInstances);
        }

        let reservation = match with_timeout(
            "memory reservation",
            self.timeout,
            self.metrics.memory_reservation(&cluster.name),
        )
        .await
        {
            Ok(value) => value,
            Err(e @ GatewayError::MetricUnavailable { .. }) => {
                return Ok(AssemblyOutcome::MetricUnavailable(e));
            }
            Err(e) => return Err(e),
        };

        let draining = with_timeout(
            "list draining container instances",
            self.timeout,
            self.fleet.draining_instances(cluster),
        )
        .await?;

        let Some(group) = resolve_group(cluster, self.groups, self.tag_key) else {
            return Ok(AssemblyOutcome::GroupNotFound);
        };

        let group_cpu = match with_timeout(
            "group cpu utilization",
            self.timeout,
            self.metrics.group_cpu_utilization(&group.name),
        )
        .await
        {
            Ok(cpu) => Some(cpu),
            Err(GatewayError::MetricUnavailable { .. }) => None,
            Err(e) => return Err(e),
        };

        let bounds = match group.bounds() {
            Ok(bounds) => bounds,
            Err(e) => return Ok(AssemblyOutcome::Failed(e.to_string())),
        };

        debug!(
            cluster = %cluster.name,
            active = active.len(),
            draining = draining.len(),
            reservation,
            group = %group.name,
            "snapshot assembled"
        );

        match ClusterSnapshot::new(
            cluster.clone(),
            reservation,
            active,
            draining,
            bounds,
            group_cpu,
        ) {
            Ok(snapshot) => Ok(AssemblyOutcome::Ready(Box::new(snapshot))),
            Err(e) => Ok(AssemblyOutcome::Failed(e.to_string())),
        }
    }
}
