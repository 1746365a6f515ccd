//! Routing plan assembly
//!
//! Composes analyzer, tier decider, registry, and selector into a single
//! planning step. The plan carries the ranked candidate list and a fresh
//! metadata trail; executing the plan is the orchestrator's job.

use crate::error::AppResult;
use crate::router::{
    ModelCandidate, ModelRegistry, ModelSelector, PromptAnalyzer, PromptFeatures, RoutingConstraints,
    RoutingMetadata, RoutingMode, Tier, TierDecider,
};
use std::sync::Arc;

/// Everything the attempt loop needs to start executing a request
#[derive(Debug, Clone)]
pub struct RoutingPlan {
    pub features: PromptFeatures,
    pub tier: Tier,
    /// Primary first, then ranked same-tier fallbacks
    pub candidates: Vec<Arc<ModelCandidate>>,
    pub metadata: RoutingMetadata,
}

/// Plans a route for one request; owns no per-request state
pub struct SmartRouter {
    registry: Arc<ModelRegistry>,
    selector: ModelSelector,
    analyzer: PromptAnalyzer,
    decider: TierDecider,
}

impl SmartRouter {
    pub fn new(
        registry: Arc<ModelRegistry>,
        selector: ModelSelector,
        analyzer: PromptAnalyzer,
        decider: TierDecider,
    ) -> Self {
        Self {
            registry,
            selector,
            analyzer,
            decider,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Analyze the prompt, pick a tier, and rank candidates within it.
    pub fn plan(
        &self,
        prompt: &str,
        context: &[crate::client::Message],
        mode: RoutingMode,
        constraints: &RoutingConstraints,
    ) -> AppResult<RoutingPlan> {
        let mut features = self.analyzer.analyze(prompt, context);
        apply_constraints(&mut features, constraints);

        let (tier, reasons) = match forced_tier(mode) {
            Some(tier) => (tier, vec![format!("forced_mode_{}", mode.as_str())]),
            None => {
                let decision = self.decider.decide(&features);
                (decision.tier, decision.reasons)
            }
        };

        self.select_at_tier(tier, &features, constraints, mode, reasons)
    }

    /// Re-rank candidates at `tier`, reusing already-extracted features.
    /// Used both for the initial plan and for tier escalation.
    pub fn select_at_tier(
        &self,
        tier: Tier,
        features: &PromptFeatures,
        constraints: &RoutingConstraints,
        mode: RoutingMode,
        mut reasons: Vec<String>,
    ) -> AppResult<RoutingPlan> {
        let pool = self.registry.get_candidates(tier, constraints);
        let selection = self.selector.select(features, &pool, constraints)?;

        if selection.context_filter_relaxed {
            reasons.push("constraint_relaxed:context_window".to_string());
        }
        if selection.cost_filter_relaxed {
            reasons.push("constraint_relaxed:cost_cap".to_string());
        }

        let candidates = selection.ranked();
        let mut metadata = RoutingMetadata::new(mode.as_str(), tier);
        metadata.decision_reasons = reasons;
        metadata.candidate_plan = candidates.iter().map(|c| c.label()).collect();

        tracing::debug!(
            tier = %tier,
            primary = %candidates[0].label(),
            candidate_count = candidates.len(),
            "Routing plan assembled"
        );

        Ok(RoutingPlan {
            features: features.clone(),
            tier,
            candidates,
            metadata,
        })
    }
}

/// Caller strict/json-only overrides force the strict feature flags so the
/// tier decider and validator see the same requirements the caller stated.
fn apply_constraints(features: &mut PromptFeatures, constraints: &RoutingConstraints) {
    if constraints.strict_format || constraints.json_only {
        features.strict_format = true;
        features.has_strict_constraints = true;
    }
}

fn forced_tier(mode: RoutingMode) -> Option<Tier> {
    match mode {
        RoutingMode::Cheap => Some(Tier::T0),
        RoutingMode::Strong => Some(Tier::T2),
        RoutingMode::Smart | RoutingMode::Legacy => None,
    }
}
