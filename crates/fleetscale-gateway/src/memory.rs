//! In-memory fleet implementing all three gateways.
//!
//! The fleet is a plain [`FleetState`] behind a mutex. Drains move an
//! instance from the active list to the draining list; terminations remove a
//! draining instance and decrement the owning group's desired capacity.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fleetscale_core::{ActiveInstance, ClusterRef, DrainingInstance, GroupDescriptor, InstanceId};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{ActionGateway, FleetGateway, GatewayFuture, MetricsGateway};

/// Serializable fleet contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FleetState {
    #[serde(default)]
    pub clusters: Vec<ClusterFixture>,
    #[serde(default)]
    pub groups: Vec<GroupFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterFixture {
    pub arn: String,
    /// `None` models a cluster without datapoints yet.
    #[serde(default)]
    pub memory_reservation: Option<f64>,
    #[serde(default)]
    pub active: Vec<ActiveInstance>,
    #[serde(default)]
    pub draining: Vec<DrainingInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupFixture {
    #[serde(flatten)]
    pub descriptor: GroupDescriptor,
    #[serde(default)]
    pub cpu_utilization: Option<f64>,
    /// Instance ids launched by this group.
    #[serde(default)]
    pub instances: Vec<InstanceId>,
}

/// A side effect that changed the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FleetAction {
    Drain { cluster: String, handle: String },
    Terminate { instance_id: String },
}

#[derive(Default)]
struct Inner {
    state: FleetState,
    actions: Vec<FleetAction>,
    failing_actions: HashSet<String>,
    failing_clusters: HashSet<String>,
}

/// In-memory fleet. Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryFleet {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryFleet {
    pub fn new(state: FleetState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                ..Default::default()
            })),
        }
    }

    /// Load a fleet fixture. `.toml` files are parsed as TOML, anything else
    /// as JSON.
    pub fn from_file(path: &Path) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Fixture(format!("{}: {e}", path.display())))?;

        let state: FleetState = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content).map_err(|e| GatewayError::Fixture(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| GatewayError::Fixture(e.to_string()))?
        };

        debug!(
            path = %path.display(),
            clusters = state.clusters.len(),
            groups = state.groups.len(),
            "fleet fixture loaded"
        );
        Ok(Self::new(state))
    }

    /// Make every drain/terminate addressed to `target` (handle or instance
    /// id) fail.
    pub fn fail_actions_for(&self, target: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_actions.insert(target.to_string());
        }
    }

    /// Make instance listings for the cluster with this ARN fail.
    pub fn fail_listing_for(&self, arn: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_clusters.insert(arn.to_string());
        }
    }

    /// Actions applied so far, in order.
    pub fn actions(&self) -> Vec<FleetAction> {
        self.inner
            .lock()
            .map(|inner| inner.actions.clone())
            .unwrap_or_default()
    }

    /// Copy of the current fleet contents.
    pub fn state(&self) -> FleetState {
        self.inner
            .lock()
            .map(|inner| inner.state.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| GatewayError::Backend("fleet state lock poisoned".to_string()))
    }

    fn cluster_fixture<'s>(
        state: &'s FleetState,
        cluster: &ClusterRef,
    ) -> GatewayResult<&'s ClusterFixture> {
        state
            .clusters
            .iter()
            .find(|c| c.arn == cluster.arn)
            .ok_or_else(|| GatewayError::Backend(format!("unknown cluster {}", cluster.arn)))
    }

    fn check_listing(inner: &Inner, cluster: &ClusterRef) -> GatewayResult<()> {
        if inner.failing_clusters.contains(&cluster.arn) {
            return Err(GatewayError::Backend(format!(
                "listing container instances for {} failed",
                cluster.name
            )));
        }
        Ok(())
    }

    fn apply_drain(&self, cluster: &ClusterRef, handle: &str) -> GatewayResult<()> {
        let mut inner = self.lock()?;
        if inner.failing_actions.contains(handle) {
            return Err(GatewayError::action_failed("drain", handle, "injected failure"));
        }

        let fixture = inner
            .state
            .clusters
            .iter_mut()
            .find(|c| c.arn == cluster.arn)
            .ok_or_else(|| GatewayError::action_failed("drain", handle, "unknown cluster"))?;

        if fixture.draining.iter().any(|d| d.handle == handle) {
            debug!(cluster = %cluster.name, %handle, "already draining");
            return Ok(());
        }

        let pos = fixture
            .active
            .iter()
            .position(|a| a.handle == handle)
            .ok_or_else(|| GatewayError::action_failed("drain", handle, "instance not found"))?;

        let instance = fixture.active.remove(pos);
        fixture.draining.push(DrainingInstance {
            id: instance.id,
            handle: instance.handle,
            task_count: instance.running_tasks + instance.pending_tasks,
        });

        inner.actions.push(FleetAction::Drain {
            cluster: cluster.name.clone(),
            handle: handle.to_string(),
        });
        Ok(())
    }

    fn apply_terminate(&self, instance_id: &str) -> GatewayResult<String> {
        let mut inner = self.lock()?;
        if inner.failing_actions.contains(instance_id) {
            return Err(GatewayError::action_failed(
                "terminate",
                instance_id,
                "injected failure",
            ));
        }

        let Some(group) = inner
            .state
            .groups
            .iter_mut()
            .find(|g| g.instances.iter().any(|i| i == instance_id))
        else {
            debug!(instance = %instance_id, "instance not in any group, treating as terminated");
            return Ok(format!("instance {instance_id} already terminated"));
        };

        if group.descriptor.desired_capacity <= group.descriptor.min_size {
            return Err(GatewayError::action_failed(
                "terminate",
                instance_id,
                format!(
                    "group {} is at min size {}",
                    group.descriptor.name, group.descriptor.min_size
                ),
            ));
        }

        group.descriptor.desired_capacity -= 1;
        group.instances.retain(|i| i != instance_id);
        let message = format!(
            "instance {instance_id} terminated, desired capacity of {} decremented to {}",
            group.descriptor.name, group.descriptor.desired_capacity
        );

        for cluster in &mut inner.state.clusters {
            cluster.active.retain(|a| a.id != instance_id);
            cluster.draining.retain(|d| d.id != instance_id);
        }

        inner.actions.push(FleetAction::Terminate {
            instance_id: instance_id.to_string(),
        });
        Ok(message)
    }
}

impl MetricsGateway for MemoryFleet {
    fn memory_reservation<'a>(&'a self, cluster_name: &'a str) -> GatewayFuture<'a, f64> {
        let result = self.lock().and_then(|inner| {
            inner
                .state
                .clusters
                .iter()
                .find(|c| ClusterRef::from_arn(c.arn.as_str()).name == cluster_name)
                .and_then(|c| c.memory_reservation)
                .ok_or_else(|| GatewayError::MetricUnavailable {
                    metric: "MemoryReservation".to_string(),
                    target: cluster_name.to_string(),
                })
        });
        Box::pin(std::future::ready(result))
    }

    fn group_cpu_utilization<'a>(&'a self, group_name: &'a str) -> GatewayFuture<'a, f64> {
        let result = self.lock().and_then(|inner| {
            inner
                .state
                .groups
                .iter()
                .find(|g| g.descriptor.name == group_name)
                .and_then(|g| g.cpu_utilization)
                .ok_or_else(|| GatewayError::MetricUnavailable {
                    metric: "CPUUtilization".to_string(),
                    target: group_name.to_string(),
                })
        });
        Box::pin(std::future::ready(result))
    }
}

impl FleetGateway for MemoryFleet {
    fn list_clusters(&self) -> GatewayFuture<'_, Vec<ClusterRef>> {
        let result = self.lock().map(|inner| {
            inner
                .state
                .clusters
                .iter()
                .map(|c| ClusterRef::from_arn(c.arn.as_str()))
                .collect()
        });
        Box::pin(std::future::ready(result))
    }

    fn active_instances<'a>(
        &'a self,
        cluster: &'a ClusterRef,
    ) -> GatewayFuture<'a, Vec<ActiveInstance>> {
        let result = self.lock().and_then(|inner| {
            Self::check_listing(&inner, cluster)?;
            Ok(Self::cluster_fixture(&inner.state, cluster)?.active.clone())
        });
        Box::pin(std::future::ready(result))
    }

    fn draining_instances<'a>(
        &'a self,
        cluster: &'a ClusterRef,
    ) -> GatewayFuture<'a, Vec<DrainingInstance>> {
        let result = self.lock().and_then(|inner| {
            Self::check_listing(&inner, cluster)?;
            Ok(Self::cluster_fixture(&inner.state, cluster)?.draining.clone())
        });
        Box::pin(std::future::ready(result))
    }

    fn auto_scaling_groups(&self) -> GatewayFuture<'_, Vec<GroupDescriptor>> {
        let result = self.lock().map(|inner| {
            inner
                .state
                .groups
                .iter()
                .map(|g| g.descriptor.clone())
                .collect()
        });
        Box::pin(std::future::ready(result))
    }
}

impl ActionGateway for MemoryFleet {
    fn drain<'a>(&'a self, cluster: &'a ClusterRef, handle: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(std::future::ready(self.apply_drain(cluster, handle)))
    }

    fn terminate_and_decrement<'a>(&'a self, instance_id: &'a str) -> GatewayFuture<'a, String> {
        Box::pin(std::future::ready(self.apply_terminate(instance_id)))
    }
}
