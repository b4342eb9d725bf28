//! Domain types for a single decision pass.
//!
//! Everything here is rebuilt from the live fleet at the start of each pass
//! and dropped at the end of it. Nothing is persisted.

use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};

/// Identifier of a compute instance (e.g. `i-0abc123`).
pub type InstanceId = String;

/// Opaque handle used to address a container instance in drain calls.
pub type InstanceHandle = String;

// ── Cluster ───────────────────────────────────────────────────────

/// Reference to a cluster as returned by cluster enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClusterRef {
    /// Full cluster identifier (ARN).
    pub arn: String,
    /// Short name, used as the metric dimension and for group lookup.
    pub name: String,
}

impl ClusterRef {
    /// Build a reference from an ARN. The short name is the segment after
    /// the first `/`, or the whole ARN when there is none.
    pub fn from_arn(arn: impl Into<String>) -> Self {
        let arn = arn.into();
        let name = match arn.split_once('/') {
            Some((_, name)) => name.to_string(),
            None => arn.clone(),
        };
        Self { arn, name }
    }
}

// ── Instances ─────────────────────────────────────────────────────

/// An ACTIVE container instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveInstance {
    pub id: InstanceId,
    pub running_tasks: u32,
    pub pending_tasks: u32,
    /// Free (not total) memory left on the instance.
    pub free_memory: i64,
    pub handle: InstanceHandle,
}

impl ActiveInstance {
    /// No running and no pending work.
    pub fn is_idle(&self) -> bool {
        self.running_tasks == 0 && self.pending_tasks == 0
    }
}

/// An instance already in DRAINING state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrainingInstance {
    pub id: InstanceId,
    pub handle: InstanceHandle,
    /// Running + pending tasks, as reported for the draining instance itself.
    pub task_count: u32,
}

impl DrainingInstance {
    pub fn is_empty(&self) -> bool {
        self.task_count == 0
    }
}

// ── Auto-scaling group ────────────────────────────────────────────

/// Raw auto-scaling group descriptor as returned by the fleet gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupDescriptor {
    pub name: String,
    pub min_size: u32,
    pub desired_capacity: u32,
    /// Group tags, in the order the provider returned them.
    #[serde(default)]
    pub tags: Vec<GroupTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupTag {
    pub key: String,
    pub value: String,
}

impl GroupDescriptor {
    /// Whether this group carries `key` with a value containing `cluster_name`.
    pub fn tagged_for(&self, key: &str, cluster_name: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.key == key && t.value.contains(cluster_name))
    }

    pub fn bounds(&self) -> SnapshotResult<AutoScalingBounds> {
        AutoScalingBounds::new(&self.name, self.min_size, self.desired_capacity)
    }
}

/// Size bounds of the group backing a cluster.
///
/// Invariant: `desired_capacity >= min_size`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawBounds")]
pub struct AutoScalingBounds {
    pub group: String,
    min_size: u32,
    desired_capacity: u32,
}

#[derive(Deserialize)]
struct RawBounds {
    group: String,
    min_size: u32,
    desired_capacity: u32,
}

impl TryFrom<RawBounds> for AutoScalingBounds {
    type Error = SnapshotError;

    fn try_from(raw: RawBounds) -> SnapshotResult<Self> {
        Self::new(&raw.group, raw.min_size, raw.desired_capacity)
    }
}

impl AutoScalingBounds {
    pub fn new(group: &str, min_size: u32, desired_capacity: u32) -> SnapshotResult<Self> {
        if desired_capacity < min_size {
            return Err(SnapshotError::InvalidBounds {
                group: group.to_string(),
                min_size,
                desired_capacity,
            });
        }
        Ok(Self {
            group: group.to_string(),
            min_size,
            desired_capacity,
        })
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn desired_capacity(&self) -> u32 {
        self.desired_capacity
    }

    /// Instances that can be removed before hitting `min_size`.
    pub fn headroom(&self) -> u32 {
        self.desired_capacity - self.min_size
    }
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Point-in-time view of one cluster, assembled once per pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    pub cluster: ClusterRef,
    /// Memory reservation average over the trailing window (0–100).
    pub memory_reservation: f64,
    /// Active instances in discovery order.
    pub active: Vec<ActiveInstance>,
    /// Draining instances in discovery order.
    pub draining: Vec<DrainingInstance>,
    pub bounds: AutoScalingBounds,
    /// CPU average of the backing group; `None` when no datapoints exist.
    pub group_cpu: Option<f64>,
}

impl ClusterSnapshot {
    /// Assemble a snapshot, rejecting an instance observed in both states.
    pub fn new(
        cluster: ClusterRef,
        memory_reservation: f64,
        active: Vec<ActiveInstance>,
        draining: Vec<DrainingInstance>,
        bounds: AutoScalingBounds,
        group_cpu: Option<f64>,
    ) -> SnapshotResult<Self> {
        if let Some(dup) = draining
            .iter()
            .find(|d| active.iter().any(|a| a.id == d.id))
        {
            return Err(SnapshotError::InstanceInBothStates {
                cluster: cluster.name.clone(),
                instance: dup.id.clone(),
            });
        }

        Ok(Self {
            cluster,
            memory_reservation,
            active,
            draining,
            bounds,
            group_cpu,
        })
    }

    pub fn name(&self) -> &str {
        &self.cluster.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(id: &str) -> ActiveInstance {
        ActiveInstance {
            id: id.to_string(),
            running_tasks: 1,
            pending_tasks: 0,
            free_memory: 512,
            handle: format!("arn:ci/{id}"),
        }
    }

    #[test]
    fn cluster_name_from_arn() {
        let c = ClusterRef::from_arn("arn:aws:ecs:us-east-1:123:cluster/web");
        assert_eq!(c.name, "web");

        let c = ClusterRef::from_arn("plain");
        assert_eq!(c.name, "plain");
    }

    #[test]
    fn bounds_reject_desired_below_min() {
        let err = AutoScalingBounds::new("asg", 3, 2).unwrap_err();
        assert!(matches!(err, SnapshotError::InvalidBounds { .. }));

        let ok = AutoScalingBounds::new("asg", 3, 5).unwrap();
        assert_eq!(ok.headroom(), 2);
    }

    #[test]
    fn idle_requires_no_pending() {
        let mut i = active("i-1");
        i.running_tasks = 0;
        assert!(i.is_idle());
        i.pending_tasks = 1;
        assert!(!i.is_idle());
    }

    #[test]
    fn snapshot_rejects_overlap() {
        let bounds = AutoScalingBounds::new("asg", 1, 3).unwrap();
        let draining = vec![DrainingInstance {
            id: "i-1".to_string(),
            handle: "arn:ci/i-1".to_string(),
            task_count: 0,
        }];
        let err = ClusterSnapshot::new(
            ClusterRef::from_arn("cluster/web"),
            50.0,
            vec![active("i-1"), active("i-2")],
            draining,
            bounds,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::InstanceInBothStates { ref instance, .. } if instance == "i-1"));
    }

    #[test]
    fn group_tag_match_is_substring() {
        let g = GroupDescriptor {
            name: "web-asg".to_string(),
            min_size: 1,
            desired_capacity: 2,
            tags: vec![GroupTag {
                key: "aws:cloudformation:stack-name".to_string(),
                value: "prod-web-stack".to_string(),
            }],
        };
        assert!(g.tagged_for("aws:cloudformation:stack-name", "web"));
        assert!(!g.tagged_for("aws:cloudformation:stack-name", "api"));
        assert!(!g.tagged_for("Name", "web"));
    }
}
