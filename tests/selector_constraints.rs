//! Property tests for candidate ranking: the selector fails only on an
//! empty pool, never picks a disabled model, and honors the context filter
//! unless it reports relaxing it.

use polyroute::router::{
    ConstantReliability, ModelCandidate, ModelSelector, PromptFeatures, RoutingConstraints, Tier,
};
use proptest::prelude::*;
use std::sync::Arc;

const TOKEN_BUFFER: u64 = 200;

fn candidate_strategy() -> impl Strategy<Value = Arc<ModelCandidate>> {
    (
        prop_oneof![Just("alpha"), Just("beta"), Just("gamma")],
        "[a-z]{3,8}",
        0.01f64..50.0,
        0.01f64..100.0,
        1_000u64..200_000,
        any::<bool>(),
        proptest::collection::vec(
            prop_oneof![
                Just("cheap"),
                Just("coding"),
                Just("reasoning"),
                Just("long_context"),
                Just("non_reasoning"),
            ],
            0..3,
        ),
    )
        .prop_map(
            |(provider, model_name, input_cost, output_cost, context_limit, enabled, tags)| {
                Arc::new(ModelCandidate {
                    provider: provider.to_string(),
                    model_name,
                    tier: Tier::T1,
                    input_cost_per_1m: input_cost,
                    output_cost_per_1m: output_cost,
                    context_limit,
                    tags: tags.into_iter().map(str::to_string).collect(),
                    enabled,
                })
            },
        )
}

fn pool() -> impl Strategy<Value = Vec<Arc<ModelCandidate>>> {
    proptest::collection::vec(candidate_strategy(), 0..8)
}

fn features(token_estimate: u64) -> PromptFeatures {
    PromptFeatures {
        token_estimate,
        ..Default::default()
    }
}

fn selector() -> ModelSelector {
    ModelSelector::new(Arc::new(ConstantReliability), TOKEN_BUFFER)
}

proptest! {
    #[test]
    fn fails_only_when_no_enabled_candidate(
        candidates in pool(),
        tokens in 0u64..50_000,
    ) {
        let result = selector().select(
            &features(tokens),
            &candidates,
            &RoutingConstraints::default(),
        );
        let any_enabled = candidates.iter().any(|c| c.enabled);
        prop_assert_eq!(result.is_ok(), any_enabled);
    }

    #[test]
    fn ranked_models_are_enabled_and_from_the_pool(
        candidates in pool(),
        tokens in 0u64..50_000,
    ) {
        prop_assume!(candidates.iter().any(|c| c.enabled));
        let result = selector()
            .select(&features(tokens), &candidates, &RoutingConstraints::default())
            .unwrap();

        for picked in result.ranked() {
            prop_assert!(picked.enabled);
            prop_assert!(candidates.iter().any(|c| Arc::ptr_eq(c, &picked)));
        }
    }

    #[test]
    fn context_filter_holds_unless_relaxed(
        candidates in pool(),
        tokens in 0u64..50_000,
    ) {
        prop_assume!(candidates.iter().any(|c| c.enabled));
        let result = selector()
            .select(&features(tokens), &candidates, &RoutingConstraints::default())
            .unwrap();

        if !result.context_filter_relaxed {
            for picked in result.ranked() {
                prop_assert!(picked.context_limit >= tokens + TOKEN_BUFFER);
            }
        }
    }

    #[test]
    fn ranking_is_deterministic(
        candidates in pool(),
        tokens in 0u64..50_000,
    ) {
        prop_assume!(candidates.iter().any(|c| c.enabled));
        let constraints = RoutingConstraints::default();
        let first = selector()
            .select(&features(tokens), &candidates, &constraints)
            .unwrap();
        let second = selector()
            .select(&features(tokens), &candidates, &constraints)
            .unwrap();

        let order = |r: &polyroute::router::SelectionResult| {
            r.ranked()
                .iter()
                .map(|c| format!("{}/{}", c.provider, c.model_name))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn cost_cap_filters_or_reports_relaxation(
        candidates in pool(),
        tokens in 1u64..50_000,
        cap in 0.000_001f64..1.0,
    ) {
        prop_assume!(candidates.iter().any(|c| c.enabled));
        let constraints = RoutingConstraints {
            max_cost_usd: Some(cap),
            ..Default::default()
        };
        let result = selector()
            .select(&features(tokens), &candidates, &constraints)
            .unwrap();

        // Either something affordable was found, or relaxation is flagged
        // and the selection still produced a primary.
        if result.cost_filter_relaxed {
            prop_assert!(result.primary.enabled);
        }
    }
}
