//! Static model catalogue
//!
//! Built once from configuration at startup and shared immutably across
//! requests. Candidate lookups filter by tier, enabled flag, provider
//! allow-list, and minimum context window.

use crate::config::Config;
use crate::router::{RoutingConstraints, Tier};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One routable backend model with its pricing and capability tags
///
/// Immutable after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCandidate {
    pub provider: String,
    pub model_name: String,
    pub tier: Tier,
    pub input_cost_per_1m: f64,
    pub output_cost_per_1m: f64,
    pub context_limit: u64,
    pub tags: Vec<String>,
    pub enabled: bool,
}

impl ModelCandidate {
    /// `provider/model` label used in logs and the candidate plan
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model_name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Catalogue of providers and their models plus the routing defaults
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    providers: BTreeMap<String, Vec<Arc<ModelCandidate>>>,
    tier_order: Vec<Tier>,
    allow_providers: Vec<String>,
}

impl ModelRegistry {
    /// Build the registry from validated configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut providers = BTreeMap::new();
        for (provider_name, provider) in &config.providers {
            let candidates: Vec<Arc<ModelCandidate>> = provider
                .models
                .iter()
                .map(|m| {
                    Arc::new(ModelCandidate {
                        provider: provider_name.clone(),
                        model_name: m.name.clone(),
                        tier: m.tier,
                        input_cost_per_1m: m.input_cost_per_1m,
                        output_cost_per_1m: m.output_cost_per_1m,
                        context_limit: m.context_limit,
                        tags: m.tags.clone(),
                        enabled: m.enabled,
                    })
                })
                .collect();
            providers.insert(provider_name.clone(), candidates);
        }

        Self {
            providers,
            tier_order: config.routing.tier_order.clone(),
            allow_providers: config.routing.allow_providers.clone(),
        }
    }

    /// The configured escalation order, lowest tier first.
    pub fn tier_order(&self) -> &[Tier] {
        &self.tier_order
    }

    /// The lowest tier in the configured order.
    pub fn first_tier(&self) -> Tier {
        // Config validation guarantees a non-empty tier_order.
        self.tier_order.first().copied().unwrap_or(Tier::T1)
    }

    /// Next tier up the ladder, or `None` at the top.
    pub fn next_tier(&self, tier: Tier) -> Option<Tier> {
        let idx = self.tier_order.iter().position(|t| *t == tier)?;
        self.tier_order.get(idx + 1).copied()
    }

    /// Enabled candidates at `tier` passing the allow-list and context filter
    ///
    /// A caller-supplied allow-list replaces the configured default entirely;
    /// an absent caller list falls back to the default (empty = all allowed).
    pub fn get_candidates(
        &self,
        tier: Tier,
        constraints: &RoutingConstraints,
    ) -> Vec<Arc<ModelCandidate>> {
        let allowed: Option<Vec<String>> = match &constraints.allowed_providers {
            Some(list) => Some(list.iter().map(|p| p.to_lowercase()).collect()),
            None if !self.allow_providers.is_empty() => {
                Some(self.allow_providers.iter().map(|p| p.to_lowercase()).collect())
            }
            None => None,
        };

        let mut results = Vec::new();
        for (provider, candidates) in &self.providers {
            if let Some(allowed) = &allowed
                && !allowed.contains(&provider.to_lowercase())
            {
                continue;
            }
            for candidate in candidates {
                if !candidate.enabled || candidate.tier != tier {
                    continue;
                }
                if let Some(min) = constraints.min_context_limit
                    && candidate.context_limit < min
                {
                    continue;
                }
                results.push(Arc::clone(candidate));
            }
        }
        results
    }

    /// Exact provider+model lookup (provider match is case-insensitive).
    pub fn find_model(&self, provider: &str, model_name: &str) -> Option<Arc<ModelCandidate>> {
        let provider = provider.trim();
        let model_name = model_name.trim();
        if provider.is_empty() || model_name.is_empty() {
            return None;
        }

        self.providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .and_then(|(_, candidates)| {
                candidates
                    .iter()
                    .find(|c| c.model_name == model_name)
                    .cloned()
            })
    }

    /// First enabled model for `provider`, in configuration order. Used by
    /// legacy dispatch when the caller names a provider but no model.
    pub fn default_model(&self, provider: &str) -> Option<Arc<ModelCandidate>> {
        self.providers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider.trim()))
            .and_then(|(_, candidates)| candidates.iter().find(|c| c.enabled).cloned())
    }

    pub fn is_enabled_model(&self, provider: &str, model_name: &str) -> bool {
        self.find_model(provider, model_name)
            .is_some_and(|c| c.enabled)
    }

    /// All enabled candidates across every tier and provider.
    pub fn list_enabled(&self) -> Vec<Arc<ModelCandidate>> {
        self.providers
            .values()
            .flatten()
            .filter(|c| c.enabled)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8088

            [providers.openai]
            base_url = "https://api.openai.com/v1"

            [[providers.openai.models]]
            name = "mini"
            tier = "t1"
            input_cost_per_1m = 0.15
            output_cost_per_1m = 0.6
            context_limit = 128000
            tags = ["cheap"]

            [[providers.openai.models]]
            name = "big"
            tier = "t2"
            input_cost_per_1m = 2.5
            output_cost_per_1m = 10.0
            context_limit = 128000
            tags = ["coding"]

            [[providers.openai.models]]
            name = "disabled-model"
            tier = "t1"
            input_cost_per_1m = 1.0
            output_cost_per_1m = 1.0
            context_limit = 128000
            enabled = false

            [providers.local]
            base_url = "http://127.0.0.1:8080/v1"

            [[providers.local.models]]
            name = "tiny"
            tier = "t1"
            input_cost_per_1m = 0.0
            output_cost_per_1m = 0.0
            context_limit = 4096
            tags = ["cheap", "non_reasoning"]
            "#,
        )
        .expect("config should parse");
        config.validate().expect("config should validate");
        ModelRegistry::from_config(&config)
    }

    #[test]
    fn test_get_candidates_filters_disabled() {
        let candidates = registry().get_candidates(Tier::T1, &RoutingConstraints::default());
        let names: Vec<&str> = candidates.iter().map(|c| c.model_name.as_str()).collect();
        assert!(names.contains(&"mini"));
        assert!(names.contains(&"tiny"));
        assert!(!names.contains(&"disabled-model"));
    }

    #[test]
    fn test_get_candidates_filters_by_tier() {
        let candidates = registry().get_candidates(Tier::T2, &RoutingConstraints::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model_name, "big");
    }

    #[test]
    fn test_allow_list_override_is_case_insensitive() {
        let constraints = RoutingConstraints {
            allowed_providers: Some(vec!["OpenAI".to_string()]),
            ..Default::default()
        };
        let candidates = registry().get_candidates(Tier::T1, &constraints);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].provider, "openai");
    }

    #[test]
    fn test_min_context_limit_filter() {
        let constraints = RoutingConstraints {
            min_context_limit: Some(8_192),
            ..Default::default()
        };
        let candidates = registry().get_candidates(Tier::T1, &constraints);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].model_name, "mini");
    }

    #[test]
    fn test_next_tier_walks_order_and_stops_at_top() {
        let reg = registry();
        assert_eq!(reg.next_tier(Tier::T0), Some(Tier::T1));
        assert_eq!(reg.next_tier(Tier::T2), Some(Tier::T3));
        assert_eq!(reg.next_tier(Tier::T3), None);
    }

    #[test]
    fn test_find_model_case_insensitive_provider() {
        let reg = registry();
        assert!(reg.find_model("OPENAI", "mini").is_some());
        assert!(reg.find_model("openai", "MINI").is_none());
        assert!(reg.find_model("", "mini").is_none());
        assert!(reg.find_model("openai", "").is_none());
    }

    #[test]
    fn test_is_enabled_model() {
        let reg = registry();
        assert!(reg.is_enabled_model("openai", "mini"));
        assert!(!reg.is_enabled_model("openai", "disabled-model"));
        assert!(!reg.is_enabled_model("openai", "nonexistent"));
    }

    #[test]
    fn test_default_model_skips_disabled() {
        let reg = registry();
        assert_eq!(reg.default_model("openai").unwrap().model_name, "mini");
        assert_eq!(reg.default_model("LOCAL").unwrap().model_name, "tiny");
        assert!(reg.default_model("ghost").is_none());
    }

    #[test]
    fn test_list_enabled_spans_providers() {
        let models = registry().list_enabled();
        assert_eq!(models.len(), 3);
    }
}
