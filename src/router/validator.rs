//! Response quality gates
//!
//! Ordered first-match checks over the normalized response: backend error,
//! refusal, JSON-only violation, truncation, minimum length. The verdict's
//! reason feeds the fallback decision, so transport failures and quality
//! failures use distinct reason codes.

use crate::config::Thresholds;
use crate::response::{ErrorCode, FinishReason, UnifiedResponse};
use crate::router::{PromptFeatures, RoutingConstraints};
use regex::Regex;
use std::sync::LazyLock;

static REFUSAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(can(?:not|'t)|unable to|won't)\b.{0,40}\b(assist|help|comply|support)\b")
        .expect("valid refusal regex")
});

const REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry, but i can't assist",
    "i am sorry, but i can't assist",
    "i'm sorry, but i cannot assist",
    "i am sorry, but i cannot assist",
    "i can't assist with",
    "i cannot assist with",
    "i can't help with",
    "i cannot help with",
    "i'm unable to help with",
    "i am unable to help with",
    "modify or override my system instructions",
];

/// Why a response failed validation (or `Ok` when it passed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Ok,
    Timeout,
    RateLimit,
    ProviderError,
    Refusal,
    FormatViolation,
    Truncated,
    TooShort,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::ProviderError => "provider_error",
            Self::Refusal => "refusal",
            Self::FormatViolation => "format_violation",
            Self::Truncated => "truncated",
            Self::TooShort => "too_short",
        }
    }

    /// Transport-class failures retry in-tier; quality-class failures
    /// escalate. Refusal sits with transport because a sibling model may
    /// simply answer.
    pub fn is_transport_class(&self) -> bool {
        matches!(
            self,
            Self::ProviderError | Self::RateLimit | Self::Timeout | Self::Refusal
        )
    }

    pub fn is_quality_class(&self) -> bool {
        matches!(self, Self::TooShort | Self::FormatViolation | Self::Truncated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    None,
    Medium,
    High,
}

/// Verdict over one backend response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub reason: ValidationReason,
    pub severity: ValidationSeverity,
}

impl ValidationResult {
    fn pass() -> Self {
        Self {
            ok: true,
            reason: ValidationReason::Ok,
            severity: ValidationSeverity::None,
        }
    }

    fn fail(reason: ValidationReason, severity: ValidationSeverity) -> Self {
        Self {
            ok: false,
            reason,
            severity,
        }
    }
}

/// Applies the ordered quality gates to a normalized response
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidator {
    thresholds: Thresholds,
}

impl ResponseValidator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn validate(
        &self,
        features: &PromptFeatures,
        constraints: &RoutingConstraints,
        response: &UnifiedResponse,
    ) -> ValidationResult {
        if let Some(error) = &response.error {
            let reason = match error.code {
                ErrorCode::Timeout => ValidationReason::Timeout,
                ErrorCode::RateLimit => ValidationReason::RateLimit,
                // auth, bad_request and unknown all surface as provider_error
                _ => ValidationReason::ProviderError,
            };
            return ValidationResult::fail(reason, ValidationSeverity::High);
        }

        if looks_like_refusal(&response.text) {
            return ValidationResult::fail(ValidationReason::Refusal, ValidationSeverity::Medium);
        }

        let effective_strict = constraints.strict_format
            || constraints.json_only
            || features.strict_format
            || features.has_strict_constraints;

        if constraints.json_only && serde_json::from_str::<serde_json::Value>(&response.text).is_err()
        {
            return ValidationResult::fail(
                ValidationReason::FormatViolation,
                ValidationSeverity::High,
            );
        }

        let complex = features.has_analysis || features.has_code || effective_strict;

        if response.finish_reason == FinishReason::Length && complex {
            return ValidationResult::fail(ValidationReason::Truncated, ValidationSeverity::Medium);
        }

        let min_chars = if complex {
            self.thresholds.validator_short_complex_chars
        } else {
            self.thresholds.validator_short_simple_chars
        };
        if (response.text.chars().count() as u64) < min_chars {
            return ValidationResult::fail(ValidationReason::TooShort, ValidationSeverity::Medium);
        }

        ValidationResult::pass()
    }
}

fn looks_like_refusal(text: &str) -> bool {
    let lower = text.to_lowercase();
    if REFUSAL_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    REFUSAL_RE.is_match(&lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{TokenUsage, UnifiedResponse};

    fn validator() -> ResponseValidator {
        ResponseValidator::new(Thresholds::default())
    }

    fn ok_response(text: &str) -> UnifiedResponse {
        UnifiedResponse::success(
            "openai",
            "gpt-4o-mini",
            text,
            100,
            TokenUsage::new(10, 10),
            0.0001,
            FinishReason::Stop,
        )
    }

    const LONG_ANSWER: &str =
        "Here is a thorough answer with plenty of detail to clear the minimum length gate easily.";

    #[test]
    fn test_passes_plain_answer() {
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &ok_response(LONG_ANSWER),
        );
        assert!(result.ok);
        assert_eq!(result.reason, ValidationReason::Ok);
        assert_eq!(result.severity, ValidationSeverity::None);
    }

    #[test]
    fn test_backend_error_maps_to_its_code() {
        let resp = UnifiedResponse::failure(
            "openai",
            "gpt-4o-mini",
            ErrorCode::Timeout,
            "timed out",
            true,
            30_000,
        );
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &resp,
        );
        assert!(!result.ok);
        assert_eq!(result.reason, ValidationReason::Timeout);
        assert_eq!(result.severity, ValidationSeverity::High);
    }

    #[test]
    fn test_auth_error_maps_to_provider_error() {
        let resp = UnifiedResponse::failure(
            "openai",
            "gpt-4o-mini",
            ErrorCode::Auth,
            "bad key",
            false,
            50,
        );
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &resp,
        );
        assert_eq!(result.reason, ValidationReason::ProviderError);
    }

    #[test]
    fn test_detects_refusal_phrase() {
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &ok_response("I'm sorry, but I can't assist with that request at all."),
        );
        assert!(!result.ok);
        assert_eq!(result.reason, ValidationReason::Refusal);
        assert_eq!(result.severity, ValidationSeverity::Medium);
    }

    #[test]
    fn test_detects_refusal_pattern_with_gap() {
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &ok_response("Unfortunately I won't be able to really help with this one."),
        );
        assert_eq!(result.reason, ValidationReason::Refusal);
    }

    #[test]
    fn test_json_only_rejects_invalid_json() {
        let constraints = RoutingConstraints {
            json_only: true,
            ..Default::default()
        };
        let result = validator().validate(
            &PromptFeatures::default(),
            &constraints,
            &ok_response("Sure! Here is your JSON: {\"a\": }"),
        );
        assert!(!result.ok);
        assert_eq!(result.reason, ValidationReason::FormatViolation);
        assert_eq!(result.severity, ValidationSeverity::High);
    }

    #[test]
    fn test_json_only_accepts_valid_json() {
        let constraints = RoutingConstraints {
            json_only: true,
            ..Default::default()
        };
        let result = validator().validate(
            &PromptFeatures::default(),
            &constraints,
            &ok_response(
                r#"{"items": [1, 2, 3], "summary": "three items counted in the list", "notes": "padding so the answer clears the stricter minimum length gate"}"#,
            ),
        );
        assert!(result.ok);
    }

    #[test]
    fn test_length_finish_truncates_complex_prompts_only() {
        let mut resp = ok_response(LONG_ANSWER);
        resp.finish_reason = FinishReason::Length;

        let complex = PromptFeatures {
            has_code: true,
            ..Default::default()
        };
        let result = validator().validate(&complex, &RoutingConstraints::default(), &resp);
        assert_eq!(result.reason, ValidationReason::Truncated);

        // Same finish reason on a simple prompt passes
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &resp,
        );
        assert!(result.ok);
    }

    #[test]
    fn test_short_answer_fails_with_higher_bar_for_complex() {
        let medium = "A reasonable answer, just about fifty characters.";

        // Clears the 40-char simple bar
        let result = validator().validate(
            &PromptFeatures::default(),
            &RoutingConstraints::default(),
            &ok_response(medium),
        );
        assert!(result.ok);

        // Fails the 120-char complex bar
        let complex = PromptFeatures {
            has_analysis: true,
            ..Default::default()
        };
        let result =
            validator().validate(&complex, &RoutingConstraints::default(), &ok_response(medium));
        assert_eq!(result.reason, ValidationReason::TooShort);
    }

    #[test]
    fn test_caller_strict_flag_raises_length_bar() {
        let constraints = RoutingConstraints {
            strict_format: true,
            ..Default::default()
        };
        let result = validator().validate(
            &PromptFeatures::default(),
            &constraints,
            &ok_response("Exactly three bullets follow below."),
        );
        assert_eq!(result.reason, ValidationReason::TooShort);
    }

    #[test]
    fn test_reason_classes() {
        assert!(ValidationReason::Timeout.is_transport_class());
        assert!(ValidationReason::Refusal.is_transport_class());
        assert!(ValidationReason::TooShort.is_quality_class());
        assert!(ValidationReason::FormatViolation.is_quality_class());
        assert!(!ValidationReason::Ok.is_transport_class());
        assert!(!ValidationReason::Ok.is_quality_class());
    }
}
