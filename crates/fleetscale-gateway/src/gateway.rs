//! Gateway traits.
//!
//! Methods return boxed `Send` futures so the traits stay object-safe and
//! can be shared as `Arc<dyn ...>` across cluster tasks.

use std::future::Future;
use std::pin::Pin;

use fleetscale_core::{ActiveInstance, ClusterRef, DrainingInstance, GroupDescriptor};

use crate::error::GatewayResult;

/// Boxed future alias for gateway results.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send + 'a>>;

/// Point-in-time utilization figures over a trailing five minute window.
pub trait MetricsGateway: Send + Sync {
    /// Average memory reservation (0–100) of a cluster.
    ///
    /// Returns `GatewayError::MetricUnavailable` when there are no datapoints.
    fn memory_reservation<'a>(&'a self, cluster_name: &'a str) -> GatewayFuture<'a, f64>;

    /// Average CPU utilization (0–100) of an auto-scaling group.
    fn group_cpu_utilization<'a>(&'a self, group_name: &'a str) -> GatewayFuture<'a, f64>;
}

/// Fleet inventory.
pub trait FleetGateway: Send + Sync {
    fn list_clusters(&self) -> GatewayFuture<'_, Vec<ClusterRef>>;

    /// Active container instances, in provider order.
    fn active_instances<'a>(
        &'a self,
        cluster: &'a ClusterRef,
    ) -> GatewayFuture<'a, Vec<ActiveInstance>>;

    /// Draining container instances with their own task counts.
    fn draining_instances<'a>(
        &'a self,
        cluster: &'a ClusterRef,
    ) -> GatewayFuture<'a, Vec<DrainingInstance>>;

    fn auto_scaling_groups(&self) -> GatewayFuture<'_, Vec<GroupDescriptor>>;
}

/// Side effects. Implementations treat "already in target state" as success.
pub trait ActionGateway: Send + Sync {
    /// Move a container instance to DRAINING.
    fn drain<'a>(&'a self, cluster: &'a ClusterRef, handle: &'a str) -> GatewayFuture<'a, ()>;

    /// Terminate an instance and decrement its group's desired capacity.
    ///
    /// Returns the provider's activity description.
    fn terminate_and_decrement<'a>(&'a self, instance_id: &'a str) -> GatewayFuture<'a, String>;
}
