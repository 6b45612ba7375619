//! Configuration schema.
//!
//! Hierarchy: `Config` → `AgentConfig`, `ProvidersConfig`, `ToolsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.toolstep/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    pub tools: ToolsConfig,
}

// ─────────────────────────────────────────────
// Selectors
// ─────────────────────────────────────────────

/// Generates `FromStr`/`Display` for a lowercase selector enum.
macro_rules! selector {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "invalid {} '{}' (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = match self {
                    $($name::$variant => $text,)+
                };
                f.write_str(text)
            }
        }
    };
}

/// How much planning effort the instruction prefix asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningLevel {
    Low,
    #[default]
    Medium,
    High,
}

selector!(ReasoningLevel { Low => "low", Medium => "medium", High => "high" });

impl ReasoningLevel {
    /// Step ceiling used when `agent.maxSteps` is not set.
    pub fn default_max_steps(self) -> u32 {
        match self {
            ReasoningLevel::Low => 10,
            ReasoningLevel::Medium => 20,
            ReasoningLevel::High => 40,
        }
    }
}

/// What the CLI shows while the loop runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Everything: plan, progress, reasoning, tool calls and raw results.
    Verbose,
    /// Plan updates and progress.
    Plan,
    /// Progress lines only.
    #[default]
    Progress,
    /// Reasoning only.
    Reason,
    /// Nothing but warnings.
    Quiet,
}

selector!(Verbosity {
    Verbose => "verbose",
    Plan => "plan",
    Progress => "progress",
    Reason => "reason",
    Quiet => "quiet",
});

/// Output contract the model is asked to follow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputContract {
    /// A single JSON object, schema-constrained when the endpoint supports it.
    #[default]
    Schema,
    /// Free text with `<plan>`, `<reasoning>` and `<call>` blocks.
    Tagged,
}

selector!(OutputContract { Schema => "schema", Tagged => "tagged" });

/// How accumulated tool results are shown to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// A synthesized context section inside the prompt.
    #[default]
    Synthesized,
    /// Raw call/result transcript as chat messages.
    History,
}

selector!(ContextMode { Synthesized => "synthesized", History => "history" });

/// Format requested from the tool catalog service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogFormat {
    Quiet,
    #[default]
    Simple,
    Markdown,
    Xml,
    Json,
}

selector!(CatalogFormat {
    Quiet => "quiet",
    Simple => "simple",
    Markdown => "markdown",
    Xml => "xml",
    Json => "json",
});

/// Output format requested from the tool execution service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutputFormat {
    #[default]
    Text,
    Json,
    Xml,
}

selector!(ToolOutputFormat { Text => "text", Json => "json", Xml => "xml" });

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Agent settings: model, prompting, and loop guards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// LLM model identifier.
    pub model: String,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    pub reasoning: ReasoningLevel,
    pub display: Verbosity,
    pub output_contract: OutputContract,
    pub context_mode: ContextMode,
    /// Extra instructions appended to every prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    /// Step ceiling. Falls back to the reasoning level's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    /// Consecutive calls of one tool before the loop gives up.
    pub max_repeats: u32,
    /// Turns without step-number progress before a plan-revision directive.
    pub max_stuck: u32,
    /// Turns with verbatim-identical progress before an escalation directive.
    pub max_progress_repeats: u32,
    /// Empty tool results tolerated before the "answer now" directive.
    pub max_empty_results: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            reasoning: ReasoningLevel::default(),
            display: Verbosity::default(),
            output_contract: OutputContract::default(),
            context_mode: ContextMode::default(),
            custom_instructions: None,
            max_steps: None,
            max_repeats: 3,
            max_stuck: 3,
            max_progress_repeats: 2,
            max_empty_results: 3,
        }
    }
}

impl AgentConfig {
    /// Effective step ceiling.
    pub fn effective_max_steps(&self) -> u32 {
        self.max_steps
            .unwrap_or_else(|| self.reasoning.default_max_steps())
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations, one per supported backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub openrouter: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub groq: ProviderConfig,
    pub ollama: ProviderConfig,
}

impl ProvidersConfig {
    /// Names accepted by [`get_by_name`](Self::get_by_name), in registry order.
    pub const NAMES: &'static [&'static str] =
        &["openai", "anthropic", "openrouter", "deepseek", "groq", "ollama"];

    /// Get a provider config by name (e.g. `"openai"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "openai" => Some(&self.openai),
            "anthropic" => Some(&self.anthropic),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            "ollama" => Some(&self.ollama),
            _ => None,
        }
    }

    fn get_mut_by_name(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "openai" => Some(&mut self.openai),
            "anthropic" => Some(&mut self.anthropic),
            "openrouter" => Some(&mut self.openrouter),
            "deepseek" => Some(&mut self.deepseek),
            "groq" => Some(&mut self.groq),
            "ollama" => Some(&mut self.ollama),
            _ => None,
        }
    }

    /// Mutable iteration over `(name, config)` pairs.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&str, &mut ProviderConfig)) {
        for &name in Self::NAMES {
            if let Some(config) = self.get_mut_by_name(name) {
                f(name, config);
            }
        }
    }

    /// Convert to a map for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get_by_name(name).map(|c| (name.to_string(), c.clone())))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// External tool host settings.
///
/// The host executable answers `list [-q|-m|-x|-j]` with the catalog and
/// `call [-j|-x] <tool> [args...]` with a tool result on stdout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    /// Tool host executable.
    pub command: String,
    /// Arguments placed before the `list`/`call` subcommand.
    pub args: Vec<String>,
    /// Per-call timeout in seconds.
    pub timeout: u64,
    pub catalog_format: CatalogFormat,
    pub output_format: ToolOutputFormat,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            command: "mcptool".to_string(),
            args: Vec::new(),
            timeout: 60,
            catalog_format: CatalogFormat::default(),
            output_format: ToolOutputFormat::default(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.max_repeats, 3);
        assert_eq!(config.agent.max_progress_repeats, 2);
        assert_eq!(config.agent.reasoning, ReasoningLevel::Medium);
        assert_eq!(config.agent.output_contract, OutputContract::Schema);
        assert_eq!(config.tools.timeout, 60);
        assert_eq!(config.tools.catalog_format, CatalogFormat::Simple);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "agent": {
                "model": "deepseek-chat",
                "reasoning": "high",
                "display": "verbose",
                "outputContract": "tagged",
                "contextMode": "history",
                "customInstructions": "Answer in French.",
                "maxSteps": 7,
                "maxRepeats": 5
            },
            "tools": {
                "command": "r2mcp-tool",
                "args": ["--profile", "dev"],
                "timeout": 5,
                "catalogFormat": "json",
                "outputFormat": "xml"
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.agent.model, "deepseek-chat");
        assert_eq!(config.agent.reasoning, ReasoningLevel::High);
        assert_eq!(config.agent.display, Verbosity::Verbose);
        assert_eq!(config.agent.output_contract, OutputContract::Tagged);
        assert_eq!(config.agent.context_mode, ContextMode::History);
        assert_eq!(config.agent.custom_instructions.as_deref(), Some("Answer in French."));
        assert_eq!(config.agent.effective_max_steps(), 7);
        assert_eq!(config.agent.max_repeats, 5);
        // Defaults preserved for missing fields
        assert_eq!(config.agent.max_stuck, 3);
        assert_eq!(config.tools.command, "r2mcp-tool");
        assert_eq!(config.tools.args, vec!["--profile", "dev"]);
        assert_eq!(config.tools.timeout, 5);
        assert_eq!(config.tools.catalog_format, CatalogFormat::Json);
        assert_eq!(config.tools.output_format, ToolOutputFormat::Xml);
    }

    #[test]
    fn test_max_steps_follows_reasoning_level() {
        let mut agent = AgentConfig::default();
        assert_eq!(agent.effective_max_steps(), 20);
        agent.reasoning = ReasoningLevel::Low;
        assert_eq!(agent.effective_max_steps(), 10);
        agent.max_steps = Some(3);
        assert_eq!(agent.effective_max_steps(), 3);
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json["agent"].get("maxTokens").is_some());
        assert!(json["agent"].get("outputContract").is_some());
        assert!(json["tools"].get("catalogFormat").is_some());
        assert!(json["agent"].get("max_tokens").is_none());
        // Unset optionals stay out of the file
        assert!(json["agent"].get("maxSteps").is_none());
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!("HIGH".parse::<ReasoningLevel>().unwrap(), ReasoningLevel::High);
        assert_eq!(" quiet ".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert_eq!("tagged".parse::<OutputContract>().unwrap(), OutputContract::Tagged);
        assert_eq!("markdown".parse::<CatalogFormat>().unwrap(), CatalogFormat::Markdown);

        let err = "loud".parse::<Verbosity>().unwrap_err();
        assert!(err.contains("loud"));
        assert!(err.contains("verbose"));
    }

    #[test]
    fn test_selector_display_round_trip() {
        for level in [ReasoningLevel::Low, ReasoningLevel::Medium, ReasoningLevel::High] {
            assert_eq!(level.to_string().parse::<ReasoningLevel>().unwrap(), level);
        }
        assert_eq!(ToolOutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_provider_config_is_configured() {
        let empty = ProviderConfig::default();
        assert!(!empty.is_configured());

        let with_key = ProviderConfig {
            api_key: "sk-123".to_string(),
            ..Default::default()
        };
        assert!(with_key.is_configured());
    }

    #[test]
    fn test_providers_get_by_name() {
        let mut providers = ProvidersConfig::default();
        providers.deepseek.api_key = "ds-123".to_string();

        assert!(providers.get_by_name("deepseek").unwrap().is_configured());
        assert!(!providers.get_by_name("openai").unwrap().is_configured());
        assert!(providers.get_by_name("nonexistent").is_none());
        assert_eq!(providers.to_map().len(), ProvidersConfig::NAMES.len());
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.agent.model, "gpt-4o-mini");
        assert_eq!(config.tools.command, "mcptool");
    }
}
