//! Tier decision rules
//!
//! An ordered rule list mapping prompt features to an initial tier. Rules
//! are checked top to bottom; the first hit wins. Every decision carries
//! the names of the rules that fired so the routing trail stays explainable.

use crate::config::Thresholds;
use crate::router::{Intent, PromptFeatures, Tier, TierDecision};

/// Maps [`PromptFeatures`] to an initial [`Tier`]
///
/// Pure and deterministic; thresholds come from configuration.
#[derive(Debug, Clone, Copy)]
pub struct TierDecider {
    thresholds: Thresholds,
}

impl TierDecider {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn decide(&self, features: &PromptFeatures) -> TierDecision {
        let t = &self.thresholds;
        let large_input = features.token_estimate >= t.strong_prompt_tokens
            || features.context_token_estimate >= t.strong_context_tokens;

        if features.token_estimate >= t.ultra_prompt_tokens
            && features.strict_format
            && features.needs_accuracy
            && features.has_factual
        {
            return TierDecision::new(Tier::T3, "ultra_strict_high_accuracy");
        }

        if features.has_code
            && (features.has_logs_stacktrace
                || features.needs_accuracy
                || features.has_strict_constraints
                || large_input)
        {
            return TierDecision::new(Tier::T3, "complex_code_or_reasoning");
        }

        if (features.has_math || features.has_analysis)
            && (features.needs_accuracy || features.strict_format || large_input)
        {
            return TierDecision::new(Tier::T3, "advanced_reasoning");
        }

        if features.has_strict_constraints
            && features.needs_accuracy
            && (features.has_factual || features.has_analysis)
        {
            return TierDecision::new(Tier::T3, "strict_high_quality_output");
        }

        // An explicit code request counts as a code signal even when the
        // prompt carries no code yet; only real code content escalates to T3.
        let wants_code = features.has_code || features.intent == Intent::Code;

        // Any single complexity signal lands in T2, with every signal named.
        if wants_code
            || features.has_math
            || features.has_analysis
            || features.strict_format
            || features.has_logs_stacktrace
            || features.has_strict_constraints
        {
            let mut reasons = Vec::new();
            if wants_code {
                reasons.push("code_detected".to_string());
            }
            if features.has_math {
                reasons.push("math_detected".to_string());
            }
            if features.has_analysis {
                reasons.push("analysis_detected".to_string());
            }
            if features.strict_format {
                reasons.push("strict_format".to_string());
            }
            if features.has_logs_stacktrace {
                reasons.push("logs_detected".to_string());
            }
            if features.has_strict_constraints {
                reasons.push("strict_constraints".to_string());
            }
            return TierDecision {
                tier: Tier::T2,
                reasons,
            };
        }

        if large_input {
            return TierDecision::new(Tier::T2, "large_context_or_prompt");
        }

        if features.needs_accuracy && features.has_factual {
            return TierDecision::new(Tier::T2, "high_accuracy_factual");
        }

        if features.intent.is_short_simple_class()
            && features.token_estimate < t.cheap_max_prompt_tokens
            && !features.strict_format
            && !features.has_code
            && !features.has_math
            && !features.has_analysis
        {
            return TierDecision::new(Tier::T0, "short_simple_rewrite");
        }

        TierDecision::new(Tier::T1, "default_t1")
    }
}
