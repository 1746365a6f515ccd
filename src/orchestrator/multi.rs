//! Concurrent comparison dispatcher
//!
//! Fans one prompt out to several backends at once. Every slot is bounded
//! by its own timeout and isolated in its own task, so a slow, failing, or
//! panicking backend cannot disturb any other slot. The aggregate is
//! assembled in input order only after every slot has settled.

use crate::client::{CompletionClient, CompletionOptions, Message};
use crate::metrics::{CompareSlotOutcome, Metrics};
use crate::response::{ErrorCode, MultiResponse, UnifiedResponse};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One requested comparison slot
///
/// Slots that failed validation upstream (unknown or disabled model) are
/// carried as pre-settled error responses so they keep their position in
/// the aggregate while valid slots still run.
pub enum CompareSlot {
    Client(Arc<dyn CompletionClient>),
    Invalid(UnifiedResponse),
}

/// Runs comparison requests across multiple backends concurrently
pub struct MultiModelOrchestrator {
    default_timeout: Duration,
    metrics: Metrics,
}

impl MultiModelOrchestrator {
    pub fn new(default_timeout: Duration, metrics: Metrics) -> Self {
        Self {
            default_timeout,
            metrics,
        }
    }

    /// Send `messages` to every slot concurrently and aggregate in order.
    pub async fn compare(
        &self,
        messages: &[Message],
        slots: Vec<CompareSlot>,
        timeout: Option<Duration>,
    ) -> MultiResponse {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let request_group_id = Uuid::new_v4();

        tracing::info!(
            request_group_id = %request_group_id,
            slot_count = slots.len(),
            timeout_secs = timeout.as_secs(),
            "Starting comparison"
        );

        let messages: Arc<[Message]> = messages.into();
        let handles: Vec<_> = slots
            .into_iter()
            .map(|slot| match slot {
                CompareSlot::Invalid(response) => SlotHandle::Settled(Box::new(response)),
                CompareSlot::Client(client) => {
                    let provider = client.provider().to_string();
                    let model = client.model().to_string();
                    let messages = Arc::clone(&messages);
                    let options = CompletionOptions {
                        timeout,
                        ..Default::default()
                    };
                    // Spawned so a panicking client cannot take down its
                    // siblings or the dispatcher.
                    let task = tokio::spawn(async move {
                        safe_call(client, &messages, &options, timeout).await
                    });
                    SlotHandle::Running {
                        provider,
                        model,
                        task,
                    }
                }
            })
            .collect();

        let settled = join_all(handles.into_iter().map(|handle| async {
            match handle {
                SlotHandle::Settled(response) => *response,
                SlotHandle::Running {
                    provider,
                    model,
                    task,
                } => match task.await {
                    Ok(response) => response,
                    Err(join_error) => {
                        tracing::error!(
                            provider = %provider,
                            model = %model,
                            error = %join_error,
                            "Comparison slot task failed"
                        );
                        unexpected_failure_response(&provider, &model, &join_error.to_string())
                    }
                },
            }
        }))
        .await;

        for response in &settled {
            let outcome = match &response.error {
                None => CompareSlotOutcome::Success,
                Some(e) if e.code == ErrorCode::Timeout => CompareSlotOutcome::Timeout,
                Some(_) => CompareSlotOutcome::Error,
            };
            if let Err(e) = self.metrics.record_compare_slot(outcome) {
                tracing::warn!(error = %e, "Failed to record compare slot metric");
            }
        }

        let result = MultiResponse::new(request_group_id, settled);

        tracing::info!(
            request_group_id = %request_group_id,
            success_count = result.success_count(),
            error_count = result.error_count(),
            total_cost = result.total_cost(),
            total_tokens = result.total_tokens(),
            "Comparison complete"
        );

        result
    }
}

enum SlotHandle {
    Settled(Box<UnifiedResponse>),
    Running {
        provider: String,
        model: String,
        task: tokio::task::JoinHandle<UnifiedResponse>,
    },
}

/// Invoke one client under its own deadline. A timed-out slot yields a
/// retryable synthetic timeout response; the underlying call is dropped.
async fn safe_call(
    client: Arc<dyn CompletionClient>,
    messages: &[Message],
    options: &CompletionOptions,
    timeout: Duration,
) -> UnifiedResponse {
    let provider = client.provider().to_string();
    let model = client.model().to_string();
    let started = Instant::now();

    match tokio::time::timeout(timeout, client.get_completion(messages, options)).await {
        Ok(response) => response,
        Err(_) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            tracing::warn!(
                provider = %provider,
                model = %model,
                timeout_secs = timeout.as_secs(),
                "Comparison slot timed out"
            );
            timeout_response(&provider, &model, timeout, latency_ms)
        }
    }
}

fn timeout_response(
    provider: &str,
    model: &str,
    timeout: Duration,
    latency_ms: u64,
) -> UnifiedResponse {
    let mut response = UnifiedResponse::failure(
        provider,
        model,
        ErrorCode::Timeout,
        format!("Request timed out after {}s", timeout.as_secs()),
        true,
        latency_ms,
    );
    if let Some(error) = response.error.as_mut() {
        error
            .details
            .insert("timeout_seconds".to_string(), timeout.as_secs().into());
    }
    response
}

fn unexpected_failure_response(provider: &str, model: &str, detail: &str) -> UnifiedResponse {
    let mut response = UnifiedResponse::failure(
        provider,
        model,
        ErrorCode::Unknown,
        format!("Unexpected error: {detail}"),
        false,
        0,
    );
    if let Some(error) = response.error.as_mut() {
        error
            .details
            .insert("failure".to_string(), "task_panicked_or_cancelled".into());
    }
    response
}
