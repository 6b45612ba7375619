//! Config loader — reads `~/.toolstep/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.toolstep/config.json`
//! 3. Environment variables `TOOLSTEP_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Parse an env var into `T`, warning (and ignoring it) when it doesn't parse.
fn env_parse<T: FromStr>(key: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let val = std::env::var(key).ok()?;
    match val.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key = key, value = %val, "ignoring env override: {e}");
            None
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `TOOLSTEP_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `TOOLSTEP_AGENT__MODEL`, `TOOLSTEP_AGENT__MAX_TOKENS`, `TOOLSTEP_AGENT__TEMPERATURE`
/// - `TOOLSTEP_AGENT__REASONING`, `TOOLSTEP_AGENT__DISPLAY`, `TOOLSTEP_AGENT__OUTPUT_CONTRACT`
/// - `TOOLSTEP_AGENT__CUSTOM_INSTRUCTIONS`, `TOOLSTEP_AGENT__MAX_STEPS`
/// - `TOOLSTEP_PROVIDERS__<NAME>__API_KEY`, `TOOLSTEP_PROVIDERS__<NAME>__API_BASE`
/// - `TOOLSTEP_TOOLS__COMMAND`, `TOOLSTEP_TOOLS__TIMEOUT`
fn apply_env_overrides(mut config: Config) -> Config {
    let agent = &mut config.agent;
    if let Ok(val) = std::env::var("TOOLSTEP_AGENT__MODEL") {
        agent.model = val;
    }
    if let Some(n) = env_parse("TOOLSTEP_AGENT__MAX_TOKENS") {
        agent.max_tokens = n;
    }
    if let Some(t) = env_parse("TOOLSTEP_AGENT__TEMPERATURE") {
        agent.temperature = t;
    }
    if let Some(level) = env_parse("TOOLSTEP_AGENT__REASONING") {
        agent.reasoning = level;
    }
    if let Some(display) = env_parse("TOOLSTEP_AGENT__DISPLAY") {
        agent.display = display;
    }
    if let Some(contract) = env_parse("TOOLSTEP_AGENT__OUTPUT_CONTRACT") {
        agent.output_contract = contract;
    }
    if let Ok(val) = std::env::var("TOOLSTEP_AGENT__CUSTOM_INSTRUCTIONS") {
        agent.custom_instructions = if val.trim().is_empty() { None } else { Some(val) };
    }
    if let Some(n) = env_parse("TOOLSTEP_AGENT__MAX_STEPS") {
        agent.max_steps = Some(n);
    }

    config.providers.for_each_mut(|name, provider| {
        apply_provider_env(provider, &name.to_uppercase());
    });

    if let Ok(val) = std::env::var("TOOLSTEP_TOOLS__COMMAND") {
        config.tools.command = val;
    }
    if let Some(secs) = env_parse("TOOLSTEP_TOOLS__TIMEOUT") {
        config.tools.timeout = secs;
    }

    config
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(val) = std::env::var(format!("TOOLSTEP_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("TOOLSTEP_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{OutputContract, ReasoningLevel};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.agent.max_tokens, 4096);
        assert_eq!(config.tools.timeout, 60);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "agent": {
                "model": "llama3.1",
                "reasoning": "low",
                "outputContract": "tagged"
            }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.agent.model, "llama3.1");
        assert_eq!(config.agent.reasoning, ReasoningLevel::Low);
        assert_eq!(config.agent.output_contract, OutputContract::Tagged);
        // Default preserved
        assert_eq!(config.agent.temperature, 0.2);
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.agent.max_tokens, 4096);
    }

    #[test]
    fn test_unknown_selector_value_returns_defaults() {
        let file = write_temp_json(r#"{ "agent": { "reasoning": "extreme" } }"#);
        let config = load_config_from_path(file.path());
        assert_eq!(config.agent.reasoning, ReasoningLevel::Medium);
    }

    #[test]
    fn test_env_override_agent_fields() {
        std::env::set_var("TOOLSTEP_AGENT__CUSTOM_INSTRUCTIONS", "Prefer short answers.");
        std::env::set_var("TOOLSTEP_AGENT__MAX_STEPS", "4");
        let config = apply_env_overrides(Config::default());
        assert_eq!(
            config.agent.custom_instructions.as_deref(),
            Some("Prefer short answers.")
        );
        assert_eq!(config.agent.max_steps, Some(4));
        std::env::remove_var("TOOLSTEP_AGENT__CUSTOM_INSTRUCTIONS");
        std::env::remove_var("TOOLSTEP_AGENT__MAX_STEPS");
    }

    #[test]
    fn test_env_override_invalid_value_ignored() {
        std::env::set_var("TOOLSTEP_AGENT__REASONING", "ludicrous");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.agent.reasoning, ReasoningLevel::Medium);
        std::env::remove_var("TOOLSTEP_AGENT__REASONING");
    }

    #[test]
    fn test_env_override_provider_key() {
        std::env::set_var("TOOLSTEP_PROVIDERS__GROQ__API_KEY", "gsk-env-key");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.providers.groq.api_key, "gsk-env-key");
        std::env::remove_var("TOOLSTEP_PROVIDERS__GROQ__API_KEY");
    }

    #[test]
    fn test_env_override_tools_command() {
        std::env::set_var("TOOLSTEP_TOOLS__COMMAND", "/opt/tools/bin/host");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.tools.command, "/opt/tools/bin/host");
        std::env::remove_var("TOOLSTEP_TOOLS__COMMAND");
    }
}
