//! OpenAI-compatible chat completions client.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::trait_def::{CompletionRequest, ModelClient};

/// Environment variable overriding [`ModelConfig::api_url`].
pub const API_URL_ENV: &str = "SOMNI_MODEL_API_URL";
/// Environment variable overriding [`ModelConfig::model`].
pub const MODEL_ENV: &str = "SOMNI_MODEL_NAME";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SOMNI_MODEL_API_KEY";

/// Connection settings for [`HttpModelClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Full URL of the chat completions endpoint.
    pub api_url: String,
    pub model: String,
    /// Bearer token. Omitted from the request when `None`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ModelConfig {
    pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (testable without env vars).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_url: non_empty(API_URL_ENV).unwrap_or_else(|| Self::DEFAULT_API_URL.to_owned()),
            model: non_empty(MODEL_ENV).unwrap_or_else(|| Self::DEFAULT_MODEL.to_owned()),
            api_key: non_empty(API_KEY_ENV),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Errors from the HTTP model client.
#[derive(Debug, Error)]
pub enum ModelClientError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response contained no completion")]
    EmptyResponse,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: &request.prompt,
        }],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn extract_content(response: ChatCompletionResponse) -> Result<String, ModelClientError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.is_empty())
        .ok_or(ModelClientError::EmptyResponse)
}

/// Derive a provider label from the endpoint host.
fn provider_from_url(api_url: &str) -> String {
    let without_scheme = api_url
        .split_once("://")
        .map_or(api_url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', ':'])
        .next()
        .unwrap_or(without_scheme);
    if host.ends_with("openai.com") {
        "openai".to_owned()
    } else if host.is_empty() {
        "unknown".to_owned()
    } else {
        host.to_owned()
    }
}

/// Truncate an error body for inclusion in an error message.
fn snippet(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`ModelClient`] backed by an OpenAI-compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    client: Client,
    config: ModelConfig,
    provider: String,
}

impl HttpModelClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        let provider = provider_from_url(&config.api_url);
        Ok(Self {
            client,
            config,
            provider,
        })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = build_body(&self.config.model, request);

        let mut builder = self.client.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(ModelClientError::from)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelClientError::Status {
                status: status.as_u16(),
                body: snippet(&text, 200),
            }
            .into());
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(ModelClientError::from)?;
        Ok(extract_content(parsed)?)
    }
}
