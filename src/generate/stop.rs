//! Stop conditions for the step loop.
//!
//! Conditions are evaluated in declared order after every step whose tool
//! calls fully resolved; the earliest condition that fires wins. The
//! default condition is [`step_count_is`]`(DEFAULT_MAX_STEPS)`.

use std::sync::Arc;

use super::step::StepResult;

/// Steps performed before the loop stops unconditionally, unless the caller
/// configures otherwise.
pub const DEFAULT_MAX_STEPS: usize = 8;

/// Decides whether the loop should stop after the current step.
pub trait StopCondition: Send + Sync {
    /// `steps` is the full step history, most recent last.
    fn should_stop(&self, steps: &[StepResult]) -> bool;
}

impl<F> StopCondition for F
where
    F: Fn(&[StepResult]) -> bool + Send + Sync,
{
    fn should_stop(&self, steps: &[StepResult]) -> bool {
        self(steps)
    }
}

struct StepCountIs(usize);

impl StopCondition for StepCountIs {
    fn should_stop(&self, steps: &[StepResult]) -> bool {
        steps.len() >= self.0
    }
}

/// Stop once `count` steps have executed.
pub fn step_count_is(count: usize) -> Arc<dyn StopCondition> {
    // A zero budget still permits the mandatory first step.
    Arc::new(StepCountIs(count.max(1)))
}
