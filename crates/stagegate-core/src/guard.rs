//! Iteration bookkeeping with fail-closed bounds.

use stagegate_domain::{
    IterationLimits, IterationSnapshot, Phase, PipelineError, Result, ValidationOutcome,
};

/// Tracks per-phase and global reroute counters against configured
/// limits.
///
/// Owned exclusively by the controller; every reroute calls
/// [`check_and_increment`](IterationGuard::check_and_increment) before
/// re-invoking a stage. Crossing either bound is fatal and carries the
/// exact counters plus the outcome that triggered the reroute.
#[derive(Debug, Clone)]
pub struct IterationGuard {
    limits: IterationLimits,
    planning: u32,
    design: u32,
    total: u32,
}

impl IterationGuard {
    pub fn new(limits: IterationLimits) -> Self {
        Self {
            limits,
            planning: 0,
            design: 0,
            total: 0,
        }
    }

    /// Current counters.
    pub fn snapshot(&self) -> IterationSnapshot {
        IterationSnapshot {
            planning: self.planning,
            design: self.design,
            total: self.total,
        }
    }

    /// Total reroutes so far across all phases.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Configured limits.
    pub fn limits(&self) -> IterationLimits {
        self.limits
    }

    /// Record one reroute into `phase`, failing closed if either the
    /// per-phase or the global bound would be crossed.
    ///
    /// `last_outcome` is the validation outcome that triggered the
    /// reroute; it rides on the error so operators can tell oscillating
    /// feedback from a legitimately hard task.
    pub fn check_and_increment(
        &mut self,
        phase: Phase,
        last_outcome: &ValidationOutcome,
    ) -> Result<()> {
        let phase_count = match phase {
            Phase::Planning => self.planning,
            Phase::Design => self.design,
        };

        if phase_count >= self.limits.per_phase || self.total >= self.limits.total {
            return Err(PipelineError::MaxIterationsExceeded {
                iterations: self.snapshot(),
                limits: self.limits,
                last_outcome: Box::new(last_outcome.clone()),
            });
        }

        match phase {
            Phase::Planning => self.planning += 1,
            Phase::Design => self.design += 1,
        }
        self.total += 1;
        Ok(())
    }
}
