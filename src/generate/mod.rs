//! Step loop: single-step execution, stop conditions, and the controller.

mod step;
mod stop;
mod text;

pub use step::StepResult;
pub(crate) use step::ensure_call_id;
pub use stop::{DEFAULT_MAX_STEPS, StopCondition, step_count_is};
pub use text::{
    GenerateOptions, GenerateOutcome, GenerateTextError, GenerateTextResult, PendingToolSession,
    generate_text, resume_text,
};
