//! Generic HTTP-based LLM provider for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint and, when the agent asks
//! for structured output, attaches the `response_format` the endpoint understands.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{debug, error, warn};

use toolstep_core::types::{ChatCompletionRequest, ChatCompletionResponse, Message, ResponseFormat};

use crate::registry::{ProviderConfig, ProviderSpec, StructuredOutput};
use crate::traits::{LlmProvider, LlmRequestConfig, ProviderError};

/// Request timeout for a single completion.
const REQUEST_TIMEOUT_SECS: u64 = 180;

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A generic LLM provider that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication (may be empty for local servers).
    api_key: String,
    /// Default model for this provider instance.
    default_model: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
    /// Reference to the provider spec for quirks.
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

/// `response_format: {type: "json_object"}` for endpoints without schema support.
#[derive(Serialize)]
struct JsonObjectFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl HttpProvider {
    /// Create a new HttpProvider from a provider config and spec.
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        model: &str,
    ) -> Result<Self, String> {
        // Resolve API base: config > spec default
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;

        Ok(HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// The `response_format` value to send for a requested schema, per provider quirk.
    fn response_format(&self, schema: Option<&serde_json::Value>) -> Option<serde_json::Value> {
        let schema = schema?;
        let format = match self.spec.structured_output {
            StructuredOutput::JsonSchema => {
                serde_json::to_value(ResponseFormat::json_schema("agent_step", schema.clone()))
            }
            StructuredOutput::JsonObject => serde_json::to_value(JsonObjectFormat {
                format_type: "json_object",
            }),
            StructuredOutput::Unsupported => return None,
        };
        format.ok()
    }

    fn provider_name(&self) -> String {
        self.spec.display_name.to_string()
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        response_schema: Option<&serde_json::Value>,
        model: &str,
        config: &LlmRequestConfig,
    ) -> Result<String, ProviderError> {
        debug!(
            provider = self.spec.display_name,
            model = %model,
            messages = messages.len(),
            structured = response_schema.is_some(),
            "Calling LLM"
        );

        let body = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            stream: false,
            response_format: self.response_format(response_schema),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        };

        let mut request = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
            ProviderError::Transport {
                provider: self.provider_name(),
                source: e,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %body,
                "API error"
            );
            return Err(ProviderError::Status {
                provider: self.provider_name(),
                status: status.as_u16(),
                body,
            });
        }

        let chat_resp = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::Decode {
                provider: self.provider_name(),
                reason: e.to_string(),
            })?;

        let text = chat_resp
            .into_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse {
                provider: self.provider_name(),
            })?;

        debug!(
            provider = self.spec.display_name,
            chars = text.len(),
            "LLM response received"
        );
        Ok(text)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build an HttpProvider from a model name and a map of provider configs.
///
/// Matches the model to a provider, reads the config, and creates the HttpProvider.
pub fn create_provider(
    model: &str,
    providers: &std::collections::HashMap<String, ProviderConfig>,
) -> Result<HttpProvider, String> {
    let (config, spec) = crate::registry::match_provider(model, providers).ok_or_else(|| {
        format!(
            "No configured provider found for model '{}'. \
             Set an API key (e.g. TOOLSTEP_PROVIDERS__OPENAI__API_KEY) or a local apiBase.",
            model
        )
    })?;

    debug!(
        provider = spec.display_name,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or(spec.default_api_base),
        "Creating LLM provider"
    );

    HttpProvider::new(config, spec, model)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
