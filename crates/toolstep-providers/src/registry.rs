//! Provider registry — static specs for the supported OpenAI-compatible endpoints.
//!
//! Each `ProviderSpec` describes how to reach a provider and how it handles
//! structured output, which decides what `response_format` the agent may send.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec — static metadata for one provider
// ─────────────────────────────────────────────

/// How an endpoint constrains output when asked for JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuredOutput {
    /// Accepts `response_format: {type: "json_schema", ...}`.
    JsonSchema,
    /// Only accepts `response_format: {type: "json_object"}`.
    JsonObject,
    /// Ignores or rejects `response_format`; rely on prompt instructions.
    Unsupported,
}

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"openrouter"`), also the config key.
    pub name: &'static str,
    /// Keywords to match in model names (lowercase).
    pub keywords: &'static [&'static str],
    /// Human-readable name for logs.
    pub display_name: &'static str,
    /// Gateways are used as fallback when no direct match is found.
    pub is_gateway: bool,
    /// Local providers need no API key; a configured base URL is enough.
    pub is_local: bool,
    /// If the API key starts with this prefix, auto-detect this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    /// Default API base URL.
    pub default_api_base: &'static str,
    pub structured_output: StructuredOutput,
}

// ─────────────────────────────────────────────
// Providers (in priority order)
// ─────────────────────────────────────────────

/// Supported provider specifications, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        display_name: "OpenRouter",
        is_gateway: true,
        is_local: false,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
        structured_output: StructuredOutput::JsonSchema,
    },
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        display_name: "Anthropic",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: Some("sk-ant-"),
        default_api_base: "https://api.anthropic.com/v1",
        structured_output: StructuredOutput::Unsupported,
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt", "o3", "o4"],
        display_name: "OpenAI",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
        structured_output: StructuredOutput::JsonSchema,
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        display_name: "DeepSeek",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com/v1",
        structured_output: StructuredOutput::JsonObject,
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq"],
        display_name: "Groq",
        is_gateway: false,
        is_local: false,
        detect_by_key_prefix: Some("gsk_"),
        default_api_base: "https://api.groq.com/openai/v1",
        structured_output: StructuredOutput::JsonObject,
    },
    ProviderSpec {
        name: "ollama",
        keywords: &["ollama", "llama", "qwen", "mistral", "gemma"],
        display_name: "Ollama",
        is_gateway: false,
        is_local: true,
        detect_by_key_prefix: None,
        default_api_base: "http://localhost:11434/v1",
        structured_output: StructuredOutput::JsonSchema,
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways — those are fallback only. Returns the first match in
/// priority order.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Find the provider an API key belongs to, by key prefix.
pub fn find_by_key_prefix(api_key: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| {
        s.detect_by_key_prefix
            .is_some_and(|pfx| api_key.starts_with(pfx))
    })
}

/// Re-export the provider config from core — single source of truth.
pub use toolstep_core::config::schema::ProviderConfig;

/// Whether a provider entry is usable: an API key, or a base URL for local providers.
fn is_usable(spec: &ProviderSpec, config: &ProviderConfig) -> bool {
    config.is_configured() || (spec.is_local && config.api_base.is_some())
}

/// Match a model name to a configured provider.
///
/// 1. Keyword match, only if that provider is usable.
/// 2. A configured key whose prefix identifies its own provider (custom model names).
/// 3. Fallback to the first configured gateway.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name) {
            if is_usable(spec, config) {
                return Some((config, spec));
            }
        }
    }

    for spec in PROVIDERS.iter().filter(|s| !s.is_gateway) {
        if let Some(config) = providers.get(spec.name).filter(|c| c.is_configured()) {
            if find_by_key_prefix(&config.api_key).is_some_and(|s| s.name == spec.name) {
                return Some((config, spec));
            }
        }
    }

    PROVIDERS.iter().filter(|s| s.is_gateway).find_map(|spec| {
        providers
            .get(spec.name)
            .filter(|c| c.is_configured())
            .map(|c| (c, spec))
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_by_model_claude() {
        assert_eq!(find_by_model("claude-sonnet-4-20250514").unwrap().name, "anthropic");
    }

    #[test]
    fn test_find_by_model_gpt() {
        assert_eq!(find_by_model("gpt-4o-mini").unwrap().name, "openai");
    }

    #[test]
    fn test_find_by_model_deepseek() {
        assert_eq!(find_by_model("deepseek-chat").unwrap().name, "deepseek");
    }

    #[test]
    fn test_find_by_model_local_family() {
        assert_eq!(find_by_model("qwen2.5-coder:7b").unwrap().name, "ollama");
        assert_eq!(find_by_model("llama3.1").unwrap().name, "ollama");
    }

    #[test]
    fn test_find_by_model_skips_gateway() {
        let spec = find_by_model("openrouter/anthropic/claude-3");
        assert_eq!(spec.unwrap().name, "anthropic");
    }

    #[test]
    fn test_find_by_model_unknown() {
        assert!(find_by_model("some-random-model-xyz").is_none());
    }

    #[test]
    fn test_find_by_key_prefix() {
        assert_eq!(find_by_key_prefix("sk-or-abc123").unwrap().name, "openrouter");
        assert_eq!(find_by_key_prefix("gsk_abc").unwrap().name, "groq");
        assert!(find_by_key_prefix("sk-regular-key").is_none());
    }

    #[test]
    fn test_structured_output_quirks() {
        assert_eq!(
            find_by_name("openai").unwrap().structured_output,
            StructuredOutput::JsonSchema
        );
        assert_eq!(
            find_by_name("deepseek").unwrap().structured_output,
            StructuredOutput::JsonObject
        );
        assert_eq!(
            find_by_name("anthropic").unwrap().structured_output,
            StructuredOutput::Unsupported
        );
    }

    #[test]
    fn test_match_provider_direct() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), keyed("sk-ant-123"));

        let (config, spec) = match_provider("claude-sonnet-4-20250514", &providers).unwrap();
        assert_eq!(spec.name, "anthropic");
        assert_eq!(config.api_key, "sk-ant-123");
    }

    #[test]
    fn test_match_provider_local_needs_only_base() {
        let mut providers = HashMap::new();
        providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                api_base: Some("http://127.0.0.1:11434/v1".into()),
                ..Default::default()
            },
        );

        let (_, spec) = match_provider("llama3.1:8b", &providers).unwrap();
        assert_eq!(spec.name, "ollama");
    }

    #[test]
    fn test_match_provider_gateway_fallback() {
        let mut providers = HashMap::new();
        providers.insert("openrouter".to_string(), keyed("sk-or-fallback"));

        let (config, spec) = match_provider("some-unknown-model", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
        assert_eq!(config.api_key, "sk-or-fallback");
    }

    #[test]
    fn test_match_provider_by_key_prefix() {
        let mut providers = HashMap::new();
        providers.insert("groq".to_string(), keyed("gsk_live"));

        let (_, spec) = match_provider("moonlight-70b-instruct", &providers).unwrap();
        assert_eq!(spec.name, "groq");
    }

    #[test]
    fn test_match_provider_no_key() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), keyed(""));

        assert!(match_provider("claude-3", &providers).is_none());
    }

    #[test]
    fn test_all_providers_have_config_entries() {
        let names: Vec<&str> = PROVIDERS.iter().map(|s| s.name).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(names.len(), unique.len(), "Duplicate provider names found");
        for name in names {
            assert!(
                toolstep_core::config::ProvidersConfig::NAMES.contains(&name),
                "{name} missing from ProvidersConfig"
            );
        }
    }
}
