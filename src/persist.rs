//! Routing trail persistence
//!
//! The orchestrator hands each finished routing trail to a `RoutingRecorder`
//! fire-and-forget: recording never delays or fails a response. The default
//! recorder writes the trail to the structured log; database-backed sinks
//! can implement the same trait.

use crate::router::RoutingMetadata;
use async_trait::async_trait;
use uuid::Uuid;

/// Sink for finished routing trails
#[async_trait]
pub trait RoutingRecorder: Send + Sync {
    async fn record(&self, request_id: Uuid, metadata: &RoutingMetadata);
}

/// Recorder that logs the routing trail and keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecorder;

#[async_trait]
impl RoutingRecorder for LogRecorder {
    async fn record(&self, request_id: Uuid, metadata: &RoutingMetadata) {
        tracing::info!(
            request_id = %request_id,
            mode = %metadata.mode,
            initial_tier = %metadata.initial_tier,
            final_tier = %metadata.final_tier,
            attempt_count = metadata.attempt_count,
            fallback_used = metadata.fallback_used,
            decision_reasons = ?metadata.decision_reasons,
            "Routing trail"
        );
    }
}
