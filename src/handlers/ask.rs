//! Ask endpoint handler
//!
//! Handles POST /ask requests: route one prompt to a backend, validate the
//! answer, and fall back when it falls short. The response always carries
//! HTTP 200 with the outcome (success or normalized error) in the body.

use crate::client::Message;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::orchestrator;
use crate::response::UnifiedResponse;
use crate::router::{RoutingConstraints, RoutingMode};
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum allowed prompt length in characters
const MAX_PROMPT_LENGTH: usize = 100_000;

/// Maximum number of prior conversation messages accepted per request
const MAX_CONTEXT_MESSAGES: usize = 100;

/// Ask request from client
///
/// Validation is enforced during deserialization, so invalid instances
/// cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct AskRequest {
    prompt: String,
    context: Vec<Message>,
    provider: Option<String>,
    model: Option<String>,
    mode: RoutingMode,
    constraints: RoutingConstraints,
}

impl AskRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    fn into_orchestrator_request(self) -> orchestrator::AskRequest {
        orchestrator::AskRequest {
            prompt: self.prompt,
            context: self.context,
            provider: self.provider,
            model: self.model,
            mode: self.mode,
            constraints: self.constraints,
        }
    }
}

impl<'de> Deserialize<'de> for AskRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawAskRequest {
            prompt: String,
            #[serde(default)]
            context: Vec<Message>,
            #[serde(default)]
            provider: Option<String>,
            #[serde(default)]
            model: Option<String>,
            #[serde(default)]
            mode: RoutingMode,
            #[serde(default)]
            constraints: RoutingConstraints,
        }

        let raw = RawAskRequest::deserialize(deserializer)?;

        if raw.prompt.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "prompt cannot be empty or contain only whitespace",
            ));
        }

        let char_count = raw.prompt.chars().count();
        if char_count > MAX_PROMPT_LENGTH {
            return Err(serde::de::Error::custom(format!(
                "prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {char_count})"
            )));
        }

        if raw.context.len() > MAX_CONTEXT_MESSAGES {
            return Err(serde::de::Error::custom(format!(
                "context exceeds maximum of {MAX_CONTEXT_MESSAGES} messages (got {})",
                raw.context.len()
            )));
        }

        if raw.model.is_some() && raw.provider.is_none() {
            return Err(serde::de::Error::custom(
                "model requires provider to be set as well",
            ));
        }

        Ok(AskRequest {
            prompt: raw.prompt,
            context: raw.context,
            provider: raw.provider,
            model: raw.model,
            mode: raw.mode,
            constraints: raw.constraints,
        })
    }
}

/// POST /ask handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<AskRequest>,
) -> Json<UnifiedResponse> {
    tracing::debug!(
        request_id = %request_id,
        prompt_length = request.prompt().len(),
        mode = request.mode().as_str(),
        "Received ask request"
    );

    let response = state
        .orchestrator()
        .ask(request.into_orchestrator_request())
        .await;

    tracing::info!(
        request_id = %request_id,
        response_id = %response.request_id,
        provider = %response.provider,
        model = %response.model,
        success = response.is_success(),
        latency_ms = response.latency_ms,
        "Ask request complete"
    );

    Json(response)
}
