//! Eligibility gate and the per-pass drain budget.

use fleetscale_core::AutoScalingBounds;

/// The group already sits at its minimum size.
pub fn at_floor(bounds: &AutoScalingBounds) -> bool {
    bounds.desired_capacity() == bounds.min_size()
}

/// Further drains allowed this pass: headroom minus instances already
/// draining, never below zero.
pub fn scalable_count(bounds: &AutoScalingBounds, draining: usize) -> u32 {
    let draining = u32::try_from(draining).unwrap_or(u32::MAX);
    bounds.headroom().saturating_sub(draining)
}

/// Countdown of removals still permitted in this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleBudget {
    remaining: u32,
}

impl ScaleBudget {
    pub fn new(remaining: u32) -> Self {
        Self { remaining }
    }

    /// Consume one unit. Returns `false`, leaving the budget at zero, once
    /// it is exhausted.
    pub fn take(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(rest) => {
                self.remaining = rest;
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
