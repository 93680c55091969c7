//! Generative-model access.
//!
//! [`ModelClient`] is the seam between the engine and a text-generation
//! backend. [`HttpModelClient`] talks to an OpenAI-compatible chat
//! completions endpoint.

pub mod openai;
pub mod trait_def;

pub use openai::{HttpModelClient, ModelClientError, ModelConfig};
pub use trait_def::{CompletionRequest, ModelClient};
