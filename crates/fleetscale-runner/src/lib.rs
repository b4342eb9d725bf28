//! fleetscale-runner — the orchestrator around the decision engine.
//!
//! # Architecture
//!
//! ```text
//! Runner::run_once()
//!   ├── FleetGateway::list_clusters()      (filtered by avoid substring)
//!   ├── FleetGateway::auto_scaling_groups() (fetched once per pass)
//!   └── per cluster, at most `max_parallel_clusters` at a time
//!       ├── Assembler → ClusterSnapshot    (group resolved by tag here)
//!       ├── ScalingEngine::evaluate()      → DecisionResult
//!       └── submit_decision() → ActionSink (ExecutingSink | ReportingSink)
//! ```
//!
//! Every pass owns a fresh [`RunLog`]; it is emitted as one JSON line when
//! the pass completes and returned in the [`RunReport`].

pub mod assemble;
pub mod diagnostics;
pub mod event;
pub mod runner;
pub mod sink;

use std::future::Future;
use std::time::Duration;

use fleetscale_gateway::{GatewayError, GatewayResult};

pub use assemble::{Assembler, AssemblyOutcome, resolve_group};
pub use diagnostics::{DiagnosticEntry, DiagnosticKind, RunLog};
pub use event::TriggerEvent;
pub use runner::{ClusterOutcome, ClusterStatus, RunReport, Runner};
pub use sink::{ActionKind, ActionRecord, ActionSink, ExecutingSink, ReportingSink, submit_decision};

/// Await a gateway call, turning an elapsed deadline into
/// `GatewayError::Timeout`.
pub(crate) async fn with_timeout<T, F>(operation: &str, timeout: Duration, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            operation: operation.to_string(),
        }),
    }
}
