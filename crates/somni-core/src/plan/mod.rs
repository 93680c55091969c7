//! Plan generation: prompt, model attempts, output validation.

pub mod engine;
pub mod prompt;
pub mod result;
pub mod schema;

pub use engine::{MAX_ATTEMPTS, PlanEngine};
pub use prompt::{INSUFFICIENT_DATA_REPLY, RETRY_SUFFIX, build_prompt};
pub use result::{GenerationError, GenerationResult};
pub use schema::{
    Activity, Meal, Nap, PlanMetadata, PlanMetrics, PlanOutput, PlanWindow, Schedule,
    ValidationError, validate_output,
};
