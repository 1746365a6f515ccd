//! Compare endpoint handler
//!
//! Handles POST /compare requests: fan one prompt out to several explicit
//! provider/model pairs concurrently and return all results in input order.

use crate::client::Message;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::response::MultiResponse;
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Maximum allowed prompt length in characters
const MAX_PROMPT_LENGTH: usize = 100_000;

/// Maximum number of comparison targets per request
const MAX_TARGETS: usize = 8;

/// One provider/model pair to include in the comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareTarget {
    pub provider: String,
    pub model: String,
}

/// Compare request from client
///
/// Validation is enforced during deserialization.
#[derive(Debug, Clone, Serialize)]
pub struct CompareRequest {
    prompt: String,
    context: Vec<Message>,
    targets: Vec<CompareTarget>,
    timeout_seconds: Option<u64>,
}

impl CompareRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn targets(&self) -> &[CompareTarget] {
        &self.targets
    }
}

impl<'de> Deserialize<'de> for CompareRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawCompareRequest {
            prompt: String,
            #[serde(default)]
            context: Vec<Message>,
            targets: Vec<CompareTarget>,
            #[serde(default)]
            timeout_seconds: Option<u64>,
        }

        let raw = RawCompareRequest::deserialize(deserializer)?;

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

        if raw.targets.is_empty() {
            return Err(serde::de::Error::custom(
                "targets must contain at least one provider/model pair",
            ));
        }
        if raw.targets.len() > MAX_TARGETS {
            return Err(serde::de::Error::custom(format!(
                "targets exceeds maximum of {MAX_TARGETS} pairs (got {})",
                raw.targets.len()
            )));
        }
        for (index, target) in raw.targets.iter().enumerate() {
            if target.provider.trim().is_empty() || target.model.trim().is_empty() {
                return Err(serde::de::Error::custom(format!(
                    "targets[{index}] must name both a provider and a model"
                )));
            }
        }

        if raw.timeout_seconds == Some(0) {
            return Err(serde::de::Error::custom(
                "timeout_seconds must be greater than zero",
            ));
        }

        Ok(CompareRequest {
            prompt: raw.prompt,
            context: raw.context,
            targets: raw.targets,
            timeout_seconds: raw.timeout_seconds,
        })
    }
}

/// POST /compare handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CompareRequest>,
) -> Json<MultiResponse> {
    tracing::debug!(
        request_id = %request_id,
        prompt_length = request.prompt().len(),
        target_count = request.targets().len(),
        "Received compare request"
    );

    let targets: Vec<(String, String)> = request
        .targets
        .iter()
        .map(|t| (t.provider.clone(), t.model.clone()))
        .collect();
    let timeout = request.timeout_seconds.map(Duration::from_secs);

    let result = state
        .orchestrator()
        .compare(&request.prompt, &request.context, &targets, timeout)
        .await;

    tracing::info!(
        request_id = %request_id,
        request_group_id = %result.request_group_id,
        success_count = result.success_count(),
        error_count = result.error_count(),
        "Compare request complete"
    );

    Json(result)
}
