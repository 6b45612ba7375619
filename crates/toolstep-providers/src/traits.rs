//! LLM Provider trait — the model channel the agent loop talks to.
//!
//! The `HttpProvider` in `http_provider.rs` covers all OpenAI-compatible APIs;
//! tests substitute scripted implementations.

use async_trait::async_trait;
use thiserror::Error;
use toolstep_core::types::Message;

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

/// Failure of the model channel itself.
///
/// The agent loop treats every variant as fatal: a broken channel cannot be
/// recovered from by re-prompting.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("could not decode {provider} response: {reason}")]
    Decode { provider: String, reason: String },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: String },
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a non-streaming chat completion request and return the reply text.
    ///
    /// # Arguments
    /// * `messages`        — Conversation in OpenAI format.
    /// * `response_schema` — JSON Schema the reply should satisfy, if the caller
    ///   wants structured output. Providers that can't enforce it ignore it.
    /// * `model`           — Model identifier (e.g. `"gpt-4o-mini"`).
    /// * `config`          — Temperature, max_tokens, etc.
    async fn chat(
        &self,
        messages: &[Message],
        response_schema: Option<&serde_json::Value>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<String, ProviderError>;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
