//! fleetscale-gateway — the I/O boundary of the rightsizing loop.
//!
//! Three traits describe everything the loop reads from or writes to the
//! outside world:
//!
//! ```text
//! MetricsGateway  memory reservation (cluster), CPU average (group)
//! FleetGateway    clusters, active/draining instances, group descriptors
//! ActionGateway   drain(handle), terminate_and_decrement(instance_id)
//! ```
//!
//! `MemoryFleet` implements all three over an in-memory fleet state that can
//! be loaded from a JSON or TOML fixture. It backs the daemon's local mode
//! and the test suites.

pub mod error;
pub mod gateway;
pub mod memory;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{ActionGateway, FleetGateway, GatewayFuture, MetricsGateway};
pub use memory::{FleetAction, FleetState, MemoryFleet};
