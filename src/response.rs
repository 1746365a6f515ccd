//! Normalized response contract shared by every backend client
//!
//! Every provider client must return a `UnifiedResponse` - success or
//! failure. Failures are carried as a `NormalizedError` value inside the
//! response, never as an `Err`, so nothing above the client layer has to
//! handle provider-specific failure shapes.

use crate::router::RoutingMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standardized backend error taxonomy
///
/// All provider-specific failures must be normalized to one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Timeout,
    Auth,
    RateLimit,
    BadRequest,
    ProviderError,
    Unknown,
}

impl ErrorCode {
    /// Convert to string representation for logging and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::BadRequest => "bad_request",
            Self::ProviderError => "provider_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Why generation stopped, normalized across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Tool,
    ContentFilter,
    Error,
    #[default]
    None,
}

/// Normalized token usage. Providers that do not report usage fill zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Build usage from prompt/completion counts, deriving the total.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Normalized error representation across all providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    pub code: ErrorCode,
    pub message: String,
    pub provider: String,
    pub retryable: bool,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// The canonical response object that all provider clients return
///
/// This is the locked contract: no code outside the client adapters may
/// inspect provider-specific response fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedResponse {
    pub request_id: Uuid,
    /// Assistant text (empty string on error)
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub token_usage: TokenUsage,
    /// Calculated cost in USD
    pub estimated_cost: f64,
    #[serde(default)]
    pub finish_reason: FinishReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NormalizedError>,
    /// Routing trail attached by the attempt loop (absent for compare slots)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingMetadata>,
}

impl UnifiedResponse {
    /// Build a success response.
    pub fn success(
        provider: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
        latency_ms: u64,
        token_usage: TokenUsage,
        estimated_cost: f64,
        finish_reason: FinishReason,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            text: text.into(),
            provider: provider.into(),
            model: model.into(),
            latency_ms,
            token_usage,
            estimated_cost,
            finish_reason,
            error: None,
            routing: None,
        }
    }

    /// Build an error-carrying response with zeroed usage and cost.
    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
        retryable: bool,
        latency_ms: u64,
    ) -> Self {
        let provider = provider.into();
        Self {
            request_id: Uuid::new_v4(),
            text: String::new(),
            provider: provider.clone(),
            model: model.into(),
            latency_ms,
            token_usage: TokenUsage::default(),
            estimated_cost: 0.0,
            finish_reason: FinishReason::Error,
            error: Some(NormalizedError {
                code,
                message: message.into(),
                provider,
                retryable,
                details: serde_json::Map::new(),
            }),
            routing: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Order-preserving aggregate returned by the comparison dispatcher
///
/// `responses[i]` always corresponds to the i-th requested backend,
/// regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiResponse {
    pub request_group_id: Uuid,
    pub responses: Vec<UnifiedResponse>,
}

impl MultiResponse {
    pub fn new(request_group_id: Uuid, responses: Vec<UnifiedResponse>) -> Self {
        Self {
            request_group_id,
            responses,
        }
    }

    /// Number of successful responses.
    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    /// Number of error responses.
    pub fn error_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_error()).count()
    }

    /// Sum of estimated cost over successful responses only.
    pub fn total_cost(&self) -> f64 {
        self.responses
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.estimated_cost)
            .sum()
    }

    /// Sum of total tokens over successful responses only.
    pub fn total_tokens(&self) -> u64 {
        self.responses
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.token_usage.total_tokens)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_derives_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_success_response_has_no_error() {
        let resp = UnifiedResponse::success(
            "openai",
            "gpt-4o-mini",
            "hello",
            120,
            TokenUsage::new(10, 5),
            0.0001,
            FinishReason::Stop,
        );
        assert!(resp.is_success());
        assert!(!resp.is_error());
        assert_eq!(resp.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_failure_response_zeroes_usage_and_cost() {
        let resp = UnifiedResponse::failure(
            "gemini",
            "gemini-pro",
            ErrorCode::RateLimit,
            "429 from upstream",
            true,
            340,
        );
        assert!(resp.is_error());
        assert_eq!(resp.token_usage, TokenUsage::default());
        assert_eq!(resp.estimated_cost, 0.0);
        assert_eq!(resp.finish_reason, FinishReason::Error);
        let err = resp.error.expect("error should be set");
        assert_eq!(err.code, ErrorCode::RateLimit);
        assert!(err.retryable);
    }

    #[test]
    fn test_error_code_serde_snake_case() {
        assert_eq!(
            serde_json::from_str::<ErrorCode>(r#""rate_limit""#).unwrap(),
            ErrorCode::RateLimit
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::ProviderError).unwrap(),
            r#""provider_error""#
        );
    }

    #[test]
    fn test_multi_response_totals_skip_errors() {
        let ok = UnifiedResponse::success(
            "openai",
            "gpt-4o-mini",
            "fine",
            100,
            TokenUsage::new(100, 100),
            0.5,
            FinishReason::Stop,
        );
        let bad = UnifiedResponse::failure(
            "grok",
            "grok-4",
            ErrorCode::Timeout,
            "timed out",
            true,
            60_000,
        );
        let agg = MultiResponse::new(Uuid::new_v4(), vec![ok, bad]);

        assert_eq!(agg.success_count(), 1);
        assert_eq!(agg.error_count(), 1);
        assert_eq!(agg.total_tokens(), 200);
        assert!((agg.total_cost() - 0.5).abs() < f64::EPSILON);
    }
}
