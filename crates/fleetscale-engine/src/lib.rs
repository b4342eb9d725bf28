//! fleetscale-engine — the scale-in decision engine.
//!
//! Pure, synchronous logic over a [`ClusterSnapshot`]. Produces a
//! [`DecisionResult`] listing drains and terminations in submission order.
//! It never performs I/O and has no notion of dry-run.
//!
//! # Decision sequence
//!
//! ```text
//! headroom = desired - min
//! if headroom == 0:                       // at floor
//!     no drains, no terminations
//!
//! budget    = headroom - draining         // saturating
//! projected = reservation * N / (N - 1)   // 100 when N <= 1
//!
//! if budget > 0 and reservation < FUTURE_MEM_TH and projected < FUTURE_MEM_TH:
//!     drain idle instances (running == 0 and pending == 0), one budget unit each
//!     if reservation < SCALE_IN_MEM_TH and cpu < SCALE_IN_CPU_TH and budget > 0:
//!         drain the least-utilized remaining instance
//!
//! terminate draining instances with running + pending == 0,
//! at most `headroom` of them
//! ```
//!
//! [`ClusterSnapshot`]: fleetscale_core::ClusterSnapshot

pub mod decision;
pub mod eligibility;
pub mod engine;
pub mod projector;
pub mod selector;

pub use decision::{DecisionResult, DrainProposal, DrainReason, TerminateProposal, TerminateReason};
pub use eligibility::{ScaleBudget, at_floor, scalable_count};
pub use engine::{ScalingEngine, Thresholds};
pub use projector::project_reservation;
pub use selector::{idle_instances, least_utilized};
