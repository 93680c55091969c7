//! Plan generation engine for child sleep routines.
//!
//! [`plan::PlanEngine`] turns a child's logged events and survey answers
//! into a validated daily routine plan produced by a generative model.

pub mod config;
pub mod context;
pub mod gate;
pub mod model;
pub mod observability;
pub mod plan;
pub mod source;

pub use config::EngineConfig;
pub use plan::{GenerationError, GenerationResult, PlanEngine, PlanOutput};
