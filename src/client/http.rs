//! OpenAI-compatible HTTP completion client
//!
//! Speaks the `/chat/completions` wire format over reqwest and maps every
//! failure (transport, HTTP status, malformed body) into the normalized
//! error taxonomy. This is the only module that sees provider-specific
//! response shapes.

use crate::client::{CompletionClient, CompletionOptions, Message};
use crate::response::{ErrorCode, FinishReason, TokenUsage, UnifiedResponse};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;

/// Completion client for any OpenAI-compatible backend
pub struct HttpCompletionClient {
    provider: String,
    model: String,
    base_url: String,
    api_key: Option<String>,
    input_cost_per_1m: f64,
    output_cost_per_1m: f64,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl HttpCompletionClient {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        input_cost_per_1m: f64,
        output_cost_per_1m: f64,
        http: reqwest::Client,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            base_url: base_url.into(),
            api_key,
            input_cost_per_1m,
            output_cost_per_1m,
            http,
        }
    }

    fn failure(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        retryable: bool,
        latency_ms: u64,
    ) -> UnifiedResponse {
        UnifiedResponse::failure(&self.provider, &self.model, code, message, retryable, latency_ms)
    }

    fn cost_for(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 * self.input_cost_per_1m
            + usage.completion_tokens as f64 * self.output_cost_per_1m)
            / 1_000_000.0
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn get_completion(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> UnifiedResponse {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = temperature.into();
        }

        let mut request = self.http.post(&url).timeout(options.timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                let (code, retryable) = if e.is_timeout() {
                    (ErrorCode::Timeout, true)
                } else if e.is_connect() {
                    (ErrorCode::ProviderError, true)
                } else {
                    (ErrorCode::Unknown, false)
                };
                tracing::warn!(
                    provider = %self.provider,
                    model = %self.model,
                    error = %e,
                    code = code.as_str(),
                    "Completion request failed before a response arrived"
                );
                return self.failure(code, e.to_string(), retryable, latency_ms);
            }
        };

        let status = response.status();
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            let (code, retryable) = match status.as_u16() {
                401 | 403 => (ErrorCode::Auth, false),
                429 => (ErrorCode::RateLimit, true),
                400 | 404 | 422 => (ErrorCode::BadRequest, false),
                500..=599 => (ErrorCode::ProviderError, true),
                _ => (ErrorCode::Unknown, false),
            };
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.provider,
                model = %self.model,
                status = %status,
                code = code.as_str(),
                "Backend returned an error status"
            );
            return self.failure(
                code,
                format!("HTTP {status}: {}", truncate(&detail, 300)),
                retryable,
                latency_ms,
            );
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    provider = %self.provider,
                    model = %self.model,
                    error = %e,
                    "Backend response body was not valid chat-completion JSON"
                );
                return self.failure(
                    ErrorCode::ProviderError,
                    format!("malformed response body: {e}"),
                    true,
                    latency_ms,
                );
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let Some(choice) = parsed.choices.first() else {
            return self.failure(
                ErrorCode::ProviderError,
                "backend returned no choices",
                true,
                latency_ms,
            );
        };

        let text = choice.message.content.clone().unwrap_or_default();
        let finish_reason = map_finish_reason(choice.finish_reason.as_deref());
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let estimated_cost = self.cost_for(&usage);

        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            latency_ms,
            total_tokens = usage.total_tokens,
            "Completion succeeded"
        );

        UnifiedResponse::success(
            &self.provider,
            &self.model,
            text,
            latency_ms,
            usage,
            estimated_cost,
            finish_reason,
        )
    }
}

fn map_finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::Tool,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::None,
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
