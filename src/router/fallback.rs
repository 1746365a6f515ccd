//! Fallback decision function
//!
//! Pure function from (validation verdict, attempt index, elapsed time,
//! remaining candidates, policy) to the next action. Budget checks run
//! first so neither retries nor escalations can exceed the attempt or
//! latency limits.

use crate::router::{Tier, ValidationResult};

/// Retry/escalation limits for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub max_attempts: u32,
    pub max_total_latency_ms: u64,
    pub allow_escalation: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            max_total_latency_ms: 12_000,
            allow_escalation: true,
        }
    }
}

/// What the attempt loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    RetrySameTier,
    EscalateTier,
    Stop,
}

/// Decision plus the tier to escalate to and the reason that drove it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackDecision {
    pub action: NextAction,
    pub next_tier: Option<Tier>,
    pub reason: String,
}

impl FallbackDecision {
    fn stop(reason: impl Into<String>) -> Self {
        Self {
            action: NextAction::Stop,
            next_tier: None,
            reason: reason.into(),
        }
    }

    fn retry_same_tier(reason: impl Into<String>) -> Self {
        Self {
            action: NextAction::RetrySameTier,
            next_tier: None,
            reason: reason.into(),
        }
    }

    fn escalate(next_tier: Tier, reason: impl Into<String>) -> Self {
        Self {
            action: NextAction::EscalateTier,
            next_tier: Some(next_tier),
            reason: reason.into(),
        }
    }
}

/// Decides between retrying in-tier, escalating, and stopping
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackManager;

impl FallbackManager {
    pub fn new() -> Self {
        Self
    }

    /// `attempt_index` is zero-based; `next_tier_fn` resolves the ladder
    /// (None at the top).
    #[allow(clippy::too_many_arguments)]
    pub fn decide(
        &self,
        current_tier: Tier,
        validation: &ValidationResult,
        attempt_index: u32,
        elapsed_ms: u64,
        remaining_same_tier_candidates: usize,
        policy: &FallbackPolicy,
        next_tier_fn: impl Fn(Tier) -> Option<Tier>,
    ) -> FallbackDecision {
        if attempt_index + 1 >= policy.max_attempts {
            return FallbackDecision::stop("max_attempts");
        }

        if elapsed_ms >= policy.max_total_latency_ms {
            return FallbackDecision::stop("latency_budget");
        }

        let reason = validation.reason.as_str();

        if validation.reason.is_transport_class() {
            if remaining_same_tier_candidates > 0 {
                return FallbackDecision::retry_same_tier(reason);
            }
            // A refusal with nobody left in-tier is worth one tier up:
            // stronger models refuse less often.
            if validation.reason == crate::router::ValidationReason::Refusal
                && policy.allow_escalation
                && let Some(next_tier) = next_tier_fn(current_tier)
            {
                return FallbackDecision::escalate(next_tier, reason);
            }
        }

        if validation.reason.is_quality_class()
            && policy.allow_escalation
            && let Some(next_tier) = next_tier_fn(current_tier)
        {
            return FallbackDecision::escalate(next_tier, reason);
        }

        FallbackDecision::stop(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{ValidationReason, ValidationSeverity};

    fn failed(reason: ValidationReason) -> ValidationResult {
        ValidationResult {
            ok: false,
            reason,
            severity: ValidationSeverity::Medium,
        }
    }

    fn ladder(tier: Tier) -> Option<Tier> {
        match tier {
            Tier::T0 => Some(Tier::T1),
            Tier::T1 => Some(Tier::T2),
            Tier::T2 => Some(Tier::T3),
            Tier::T3 => None,
        }
    }

    fn policy() -> FallbackPolicy {
        FallbackPolicy {
            max_attempts: 3,
            max_total_latency_ms: 12_000,
            allow_escalation: true,
        }
    }

    #[test]
    fn test_max_attempts_stops_before_anything_else() {
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::Timeout),
            2,
            100,
            5,
            &policy(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
        assert_eq!(decision.reason, "max_attempts");
    }

    #[test]
    fn test_latency_budget_stops() {
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::ProviderError),
            0,
            12_001,
            5,
            &policy(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
        assert_eq!(decision.reason, "latency_budget");
    }

    #[test]
    fn test_transport_failure_retries_same_tier() {
        for reason in [
            ValidationReason::ProviderError,
            ValidationReason::RateLimit,
            ValidationReason::Timeout,
            ValidationReason::Refusal,
        ] {
            let decision = FallbackManager::new().decide(
                Tier::T1,
                &failed(reason),
                0,
                100,
                2,
                &policy(),
                ladder,
            );
            assert_eq!(decision.action, NextAction::RetrySameTier, "{reason:?}");
            assert_eq!(decision.reason, reason.as_str());
        }
    }

    #[test]
    fn test_transport_failure_without_candidates_stops() {
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::Timeout),
            0,
            100,
            0,
            &policy(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
        assert_eq!(decision.reason, "timeout");
    }

    #[test]
    fn test_refusal_without_candidates_escalates() {
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::Refusal),
            0,
            100,
            0,
            &policy(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::EscalateTier);
        assert_eq!(decision.next_tier, Some(Tier::T2));
        assert_eq!(decision.reason, "refusal");
    }

    #[test]
    fn test_quality_failure_escalates() {
        for reason in [
            ValidationReason::TooShort,
            ValidationReason::FormatViolation,
            ValidationReason::Truncated,
        ] {
            let decision = FallbackManager::new().decide(
                Tier::T1,
                &failed(reason),
                0,
                100,
                5,
                &policy(),
                ladder,
            );
            assert_eq!(decision.action, NextAction::EscalateTier, "{reason:?}");
            assert_eq!(decision.next_tier, Some(Tier::T2));
        }
    }

    #[test]
    fn test_quality_failure_at_top_tier_stops() {
        let decision = FallbackManager::new().decide(
            Tier::T3,
            &failed(ValidationReason::TooShort),
            0,
            100,
            5,
            &policy(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
        assert_eq!(decision.reason, "too_short");
    }

    #[test]
    fn test_escalation_disabled_stops() {
        let no_escalation = FallbackPolicy {
            allow_escalation: false,
            ..policy()
        };
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::FormatViolation),
            0,
            100,
            5,
            &no_escalation,
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
    }

    #[test]
    fn test_default_policy_allows_single_retry() {
        // max_attempts=2 means attempt_index 0 may continue, 1 may not
        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::Timeout),
            0,
            100,
            1,
            &FallbackPolicy::default(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::RetrySameTier);

        let decision = FallbackManager::new().decide(
            Tier::T1,
            &failed(ValidationReason::Timeout),
            1,
            100,
            1,
            &FallbackPolicy::default(),
            ladder,
        );
        assert_eq!(decision.action, NextAction::Stop);
    }
}
