//! The `ModelClient` trait.

use anyhow::Result;
use async_trait::async_trait;

/// A single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A text-generation backend.
///
/// `complete` returns the model's raw text. Transport and API failures are
/// returned as errors; the engine treats them as a failed attempt.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier, passed through to logs.
    fn model(&self) -> &str;

    /// Provider name, passed through to logs.
    fn provider(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn ModelClient) {}
};
