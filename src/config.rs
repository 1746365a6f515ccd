//! Configuration management for Polyroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Validation runs in three phases: file read, TOML parse, then semantic
//! validation. Each phase preserves its own error context.

use crate::error::{AppError, AppResult};
use crate::router::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    /// Provider name -> provider block. BTreeMap keeps iteration stable.
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Per-slot timeout for compare requests
    #[serde(default = "default_compare_timeout")]
    pub compare_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_compare_timeout() -> u64 {
    60
}

/// One backend provider and its model catalogue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL, e.g. "https://api.openai.com/v1"
    pub base_url: String,
    /// Environment variable holding the API key. Resolved at client build
    /// time, never stored in the config file itself.
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub models: Vec<ModelEntry>,
}

/// One routable model within a provider block
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub tier: Tier,
    /// Cost per 1M input tokens, USD
    pub input_cost_per_1m: f64,
    /// Cost per 1M output tokens, USD
    pub output_cost_per_1m: f64,
    pub context_limit: u64,
    /// Free-form capability tags: "coding", "reasoning", "long_context",
    /// "non_reasoning", "cheap"
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Routing defaults shared by every request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Escalation order, lowest tier first
    #[serde(default = "default_tier_order")]
    pub tier_order: Vec<Tier>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_total_latency_ms")]
    pub max_total_latency_ms: u64,
    /// Headroom added to prompt+context tokens when checking context limits
    #[serde(default = "default_token_buffer")]
    pub token_buffer: u64,
    /// Default provider allow-list. Empty means all providers are allowed.
    /// Callers may override per request.
    #[serde(default)]
    pub allow_providers: Vec<String>,
    #[serde(default = "default_allow_escalation")]
    pub allow_escalation: bool,
    #[serde(default)]
    pub thresholds: Thresholds,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            tier_order: default_tier_order(),
            max_attempts: default_max_attempts(),
            max_total_latency_ms: default_max_total_latency_ms(),
            token_buffer: default_token_buffer(),
            allow_providers: Vec::new(),
            allow_escalation: default_allow_escalation(),
            thresholds: Thresholds::default(),
        }
    }
}

fn default_tier_order() -> Vec<Tier> {
    vec![Tier::T0, Tier::T1, Tier::T2, Tier::T3]
}

fn default_max_attempts() -> u32 {
    2
}

fn default_max_total_latency_ms() -> u64 {
    12_000
}

fn default_token_buffer() -> u64 {
    200
}

fn default_allow_escalation() -> bool {
    true
}

/// Numeric cutoffs for the tier decider and response validator
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Thresholds {
    #[serde(default = "default_cheap_max_prompt_tokens")]
    pub cheap_max_prompt_tokens: u64,
    #[serde(default = "default_strong_prompt_tokens")]
    pub strong_prompt_tokens: u64,
    #[serde(default = "default_ultra_prompt_tokens")]
    pub ultra_prompt_tokens: u64,
    #[serde(default = "default_strong_context_tokens")]
    pub strong_context_tokens: u64,
    /// Minimum answer length in chars for simple prompts
    #[serde(default = "default_validator_short_simple_chars")]
    pub validator_short_simple_chars: u64,
    /// Minimum answer length in chars for analysis/code/strict prompts
    #[serde(default = "default_validator_short_complex_chars")]
    pub validator_short_complex_chars: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cheap_max_prompt_tokens: default_cheap_max_prompt_tokens(),
            strong_prompt_tokens: default_strong_prompt_tokens(),
            ultra_prompt_tokens: default_ultra_prompt_tokens(),
            strong_context_tokens: default_strong_context_tokens(),
            validator_short_simple_chars: default_validator_short_simple_chars(),
            validator_short_complex_chars: default_validator_short_complex_chars(),
        }
    }
}

fn default_cheap_max_prompt_tokens() -> u64 {
    700
}

fn default_strong_prompt_tokens() -> u64 {
    1_800
}

fn default_ultra_prompt_tokens() -> u64 {
    3_200
}

fn default_strong_context_tokens() -> u64 {
    2_200
}

fn default_validator_short_simple_chars() -> u64 {
    40
}

fn default_validator_short_complex_chars() -> u64 {
    120
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self = toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display.clone(),
            source,
        })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called automatically by `from_file()`, but can also be called
    /// explicitly when constructing Config via other means (e.g., in tests).
    pub fn validate(&self) -> AppResult<()> {
        if self.routing.tier_order.is_empty() {
            return Err(AppError::Config(
                "routing.tier_order must list at least one tier".to_string(),
            ));
        }

        let mut seen_tiers = Vec::new();
        for tier in &self.routing.tier_order {
            if seen_tiers.contains(tier) {
                return Err(AppError::Config(format!(
                    "routing.tier_order lists tier '{tier}' more than once"
                )));
            }
            seen_tiers.push(*tier);
        }

        if self.routing.max_attempts == 0 {
            return Err(AppError::Config(
                "routing.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.routing.max_total_latency_ms == 0 {
            return Err(AppError::Config(
                "routing.max_total_latency_ms must be greater than 0".to_string(),
            ));
        }

        if self.providers.is_empty() {
            return Err(AppError::Config(
                "at least one [providers.<name>] block is required".to_string(),
            ));
        }

        let mut any_enabled = false;
        for (provider_name, provider) in &self.providers {
            if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                return Err(AppError::Config(format!(
                    "provider '{provider_name}' has invalid base_url '{}'. \
                    base_url must start with 'http://' or 'https://'.",
                    provider.base_url
                )));
            }

            if provider.models.is_empty() {
                return Err(AppError::Config(format!(
                    "provider '{provider_name}' declares no models"
                )));
            }

            let mut seen_models: Vec<&str> = Vec::new();
            for model in &provider.models {
                if model.name.trim().is_empty() {
                    return Err(AppError::Config(format!(
                        "provider '{provider_name}' has a model with an empty name"
                    )));
                }
                if seen_models.contains(&model.name.as_str()) {
                    return Err(AppError::Config(format!(
                        "provider '{provider_name}' lists model '{}' more than once",
                        model.name
                    )));
                }
                seen_models.push(&model.name);

                if !self.routing.tier_order.contains(&model.tier) {
                    return Err(AppError::Config(format!(
                        "model '{provider_name}/{}' uses tier '{}' which is not in routing.tier_order",
                        model.name, model.tier
                    )));
                }

                for (field, value) in [
                    ("input_cost_per_1m", model.input_cost_per_1m),
                    ("output_cost_per_1m", model.output_cost_per_1m),
                ] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(AppError::Config(format!(
                            "model '{provider_name}/{}' has invalid {field} {value}. \
                            Costs must be finite and non-negative.",
                            model.name
                        )));
                    }
                }

                if model.context_limit == 0 {
                    return Err(AppError::Config(format!(
                        "model '{provider_name}/{}' has context_limit=0. \
                        context_limit must be greater than 0.",
                        model.name
                    )));
                }

                any_enabled = any_enabled || model.enabled;
            }
        }

        if !any_enabled {
            return Err(AppError::Config(
                "all configured models are disabled; enable at least one".to_string(),
            ));
        }

        for name in &self.routing.allow_providers {
            if !self
                .providers
                .keys()
                .any(|p| p.eq_ignore_ascii_case(name))
            {
                return Err(AppError::Config(format!(
                    "routing.allow_providers names unknown provider '{name}'"
                )));
            }
        }

        Ok(())
    }

    /// Generate a template configuration file with commented defaults
    pub fn template() -> &'static str {
        TEMPLATE
    }
}

const TEMPLATE: &str = r#"# Polyroute configuration template
# Copy to polyroute.toml and adjust for your backends.

[server]
host = "0.0.0.0"
port = 8088
request_timeout_seconds = 30
compare_timeout_seconds = 60

[providers.openai]
base_url = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"

[[providers.openai.models]]
name = "gpt-4o-mini"
tier = "t1"
input_cost_per_1m = 0.15
output_cost_per_1m = 0.6
context_limit = 128000
tags = ["cheap", "non_reasoning"]

[[providers.openai.models]]
name = "gpt-4o"
tier = "t2"
input_cost_per_1m = 2.5
output_cost_per_1m = 10.0
context_limit = 128000
tags = ["coding", "long_context"]

[[providers.openai.models]]
name = "o3"
tier = "t3"
input_cost_per_1m = 10.0
output_cost_per_1m = 40.0
context_limit = 200000
tags = ["reasoning", "coding", "long_context"]

[providers.local]
base_url = "http://127.0.0.1:8080/v1"

[[providers.local.models]]
name = "qwen2.5-7b-instruct"
tier = "t0"
input_cost_per_1m = 0.0
output_cost_per_1m = 0.0
context_limit = 32768
tags = ["cheap", "non_reasoning"]

[routing]
tier_order = ["t0", "t1", "t2", "t3"]
max_attempts = 2
max_total_latency_ms = 12000
token_buffer = 200
# allow_providers = ["openai"]
allow_escalation = true

[routing.thresholds]
cheap_max_prompt_tokens = 700
strong_prompt_tokens = 1800
ultra_prompt_tokens = 3200
strong_context_tokens = 2200
validator_short_simple_chars = 40
validator_short_complex_chars = 120

[observability]
log_level = "info"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    fn valid_config() -> Config {
        parse(TEMPLATE)
    }

    #[test]
    fn test_template_is_valid() {
        let config = valid_config();
        config.validate().expect("template should validate");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.routing.max_attempts, 2);
        assert_eq!(config.routing.thresholds.cheap_max_prompt_tokens, 700);
    }

    #[test]
    fn test_defaults_applied_when_sections_omitted() {
        let config = parse(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [providers.local]
            base_url = "http://127.0.0.1:8080/v1"

            [[providers.local.models]]
            name = "m"
            tier = "t1"
            input_cost_per_1m = 0.0
            output_cost_per_1m = 0.0
            context_limit = 8192
            "#,
        );
        config.validate().expect("minimal config should validate");
        assert_eq!(config.server.request_timeout_seconds, 30);
        assert_eq!(
            config.routing.tier_order,
            vec![Tier::T0, Tier::T1, Tier::T2, Tier::T3]
        );
        assert_eq!(config.routing.token_buffer, 200);
        assert!(config.routing.allow_escalation);
        assert!(config.providers["local"].models[0].enabled);
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let mut config = valid_config();
        config.providers.get_mut("local").unwrap().base_url = "127.0.0.1:8080".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_rejects_zero_context_limit() {
        let mut config = valid_config();
        config.providers.get_mut("local").unwrap().models[0].context_limit = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("context_limit"));
    }

    #[test]
    fn test_rejects_negative_cost() {
        let mut config = valid_config();
        config.providers.get_mut("openai").unwrap().models[0].input_cost_per_1m = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("input_cost_per_1m"));
    }

    #[test]
    fn test_rejects_tier_outside_tier_order() {
        let mut config = valid_config();
        config.routing.tier_order = vec![Tier::T0, Tier::T1];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tier_order"));
    }

    #[test]
    fn test_rejects_duplicate_model_names() {
        let mut config = valid_config();
        let provider = config.providers.get_mut("openai").unwrap();
        let dup = provider.models[0].clone();
        provider.models.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_all_models_disabled() {
        let mut config = valid_config();
        for provider in config.providers.values_mut() {
            for model in &mut provider.models {
                model.enabled = false;
            }
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_rejects_unknown_allow_provider() {
        let mut config = valid_config();
        config.routing.allow_providers = vec!["nonexistent".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_rejects_zero_max_attempts() {
        let mut config = valid_config();
        config.routing.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = Config::from_file("/nonexistent/polyroute.toml").unwrap_err();
        assert!(matches!(err, AppError::ConfigFileRead { .. }));
    }

    #[test]
    fn test_from_file_reads_and_validates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("polyroute.toml");
        std::fs::write(&path, TEMPLATE).expect("write template");
        let config = Config::from_file(&path).expect("template should load");
        assert!(config.providers.contains_key("openai"));
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nhost = ").expect("write broken file");
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, AppError::ConfigParseFailed { .. }));
    }
}
