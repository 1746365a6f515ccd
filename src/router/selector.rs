//! Candidate ranking within a tier
//!
//! Orders a tier's candidates into a primary choice plus same-tier
//! fallbacks. Filters prefer availability over strictness: a context
//! filter that would empty the set is relaxed, and the cost cap is
//! advisory. Relaxations are reported on the result so the routing
//! trail can record them.

use crate::error::{AppError, AppResult};
use crate::router::{ModelCandidate, PromptFeatures, RoutingConstraints};
use std::cmp::Ordering;
use std::sync::Arc;

/// Max token estimate for the short-simple tag preference
const SHORT_SIMPLE_MAX_TOKENS: u64 = 700;

/// Combined prompt+context tokens above which long_context models are preferred
const LARGE_CONTEXT_TOKENS: u64 = 2_200;

/// Pluggable reliability signal per provider/model pair
///
/// Scores are compared descending; higher is better. The default
/// implementation returns a constant, which keeps ranking purely
/// capability and cost driven.
pub trait ReliabilityStore: Send + Sync {
    fn get(&self, provider: &str, model: &str) -> f64;
}

/// Reliability stub that scores every model the same
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantReliability;

impl ReliabilityStore for ConstantReliability {
    fn get(&self, _provider: &str, _model: &str) -> f64 {
        1.0
    }
}

/// Ranked selection output: primary plus ordered same-tier fallbacks
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub primary: Arc<ModelCandidate>,
    pub fallbacks: Vec<Arc<ModelCandidate>>,
    /// True when the context-window filter would have emptied the set
    pub context_filter_relaxed: bool,
    /// True when no candidate fit under the caller's cost cap
    pub cost_filter_relaxed: bool,
}

impl SelectionResult {
    /// Primary followed by fallbacks, in rank order.
    pub fn ranked(&self) -> Vec<Arc<ModelCandidate>> {
        let mut all = Vec::with_capacity(1 + self.fallbacks.len());
        all.push(Arc::clone(&self.primary));
        all.extend(self.fallbacks.iter().cloned());
        all
    }
}

/// Ranks a tier's candidates under per-request constraints
pub struct ModelSelector {
    reliability: Arc<dyn ReliabilityStore>,
    token_buffer: u64,
}

impl ModelSelector {
    pub fn new(reliability: Arc<dyn ReliabilityStore>, token_buffer: u64) -> Self {
        Self {
            reliability,
            token_buffer,
        }
    }

    /// Rank `candidates` for this prompt; errors only when no enabled
    /// candidate exists at all.
    pub fn select(
        &self,
        features: &PromptFeatures,
        candidates: &[Arc<ModelCandidate>],
        constraints: &RoutingConstraints,
    ) -> AppResult<SelectionResult> {
        let required_tokens =
            features.token_estimate + features.context_token_estimate + self.token_buffer;

        let mut context_filter_relaxed = false;
        let mut filtered: Vec<Arc<ModelCandidate>> = candidates
            .iter()
            .filter(|c| c.enabled && c.context_limit >= required_tokens)
            .cloned()
            .collect();
        if filtered.is_empty() {
            filtered = candidates.iter().filter(|c| c.enabled).cloned().collect();
            context_filter_relaxed = !filtered.is_empty();
        }

        let mut cost_filter_relaxed = false;
        if let Some(max_cost) = constraints.max_cost_usd {
            let affordable: Vec<Arc<ModelCandidate>> = filtered
                .iter()
                .filter(|c| estimated_request_cost(c, features) <= max_cost)
                .cloned()
                .collect();
            if affordable.is_empty() {
                cost_filter_relaxed = !filtered.is_empty();
            } else {
                filtered = affordable;
            }
        }

        let mut ranked = filtered;
        ranked.sort_by(|a, b| self.compare(a, b, features, constraints));

        let mut iter = ranked.into_iter();
        let primary = iter.next().ok_or_else(|| {
            AppError::RoutingFailed("no model candidates available for selection".to_string())
        })?;

        Ok(SelectionResult {
            primary,
            fallbacks: iter.collect(),
            context_filter_relaxed,
            cost_filter_relaxed,
        })
    }

    /// Rank order: reliability desc, tag penalty asc, blended cost asc,
    /// preferred provider first, context limit desc. Stable sort keeps
    /// registry order for full ties.
    fn compare(
        &self,
        a: &ModelCandidate,
        b: &ModelCandidate,
        features: &PromptFeatures,
        constraints: &RoutingConstraints,
    ) -> Ordering {
        let rel_a = self.reliability.get(&a.provider, &a.model_name);
        let rel_b = self.reliability.get(&b.provider, &b.model_name);

        rel_b
            .total_cmp(&rel_a)
            .then_with(|| tag_penalty(a, features).cmp(&tag_penalty(b, features)))
            .then_with(|| blended_cost(a).total_cmp(&blended_cost(b)))
            .then_with(|| {
                provider_penalty(a, constraints).cmp(&provider_penalty(b, constraints))
            })
            .then_with(|| b.context_limit.cmp(&a.context_limit))
    }
}

/// `0.6 * input + 0.4 * output`: input tokens dominate typical requests.
fn blended_cost(candidate: &ModelCandidate) -> f64 {
    0.6 * candidate.input_cost_per_1m + 0.4 * candidate.output_cost_per_1m
}

fn provider_penalty(candidate: &ModelCandidate, constraints: &RoutingConstraints) -> u8 {
    match &constraints.preferred_provider {
        Some(preferred) if candidate.provider.eq_ignore_ascii_case(preferred) => 0,
        _ => 1,
    }
}

/// Advisory request cost: prompt tokens at input price plus a completion
/// estimate at output price. Complex prompts assume longer completions.
fn estimated_request_cost(candidate: &ModelCandidate, features: &PromptFeatures) -> f64 {
    let prompt_tokens = features.token_estimate + features.context_token_estimate;
    let completion_tokens = if features.has_code || features.has_analysis || features.has_math {
        ((features.token_estimate as f64 * 0.8) as u64).max(200)
    } else {
        ((features.token_estimate as f64 * 0.5) as u64).max(80)
    };

    (prompt_tokens as f64 * candidate.input_cost_per_1m
        + completion_tokens as f64 * candidate.output_cost_per_1m)
        / 1_000_000.0
}

fn tag_penalty(candidate: &ModelCandidate, features: &PromptFeatures) -> u32 {
    let mut penalty = 0;

    let needs_coding = features.has_code
        || features.has_logs_stacktrace
        || features.intent == crate::router::Intent::Code;
    let needs_reasoning = features.has_math
        || features.has_analysis
        || features.needs_accuracy
        || features.intent == crate::router::Intent::Analysis;
    let short_simple = features.intent.is_short_simple_class()
        && features.token_estimate < SHORT_SIMPLE_MAX_TOKENS
        && !needs_coding
        && !needs_reasoning;
    let large_context =
        features.token_estimate + features.context_token_estimate >= LARGE_CONTEXT_TOKENS;

    if needs_coding && !(candidate.has_tag("coding") || candidate.has_tag("reasoning")) {
        penalty += 3;
    }
    if needs_reasoning && !candidate.has_tag("reasoning") {
        penalty += 2;
    }
    if short_simple && !(candidate.has_tag("non_reasoning") || candidate.has_tag("cheap")) {
        penalty += 1;
    }
    if large_context && !candidate.has_tag("long_context") {
        penalty += 1;
    }

    penalty
}
