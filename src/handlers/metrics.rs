//! Prometheus metrics endpoint
//!
//! Exposes metrics in Prometheus text format for scraping.

use axum::{extract::State, http::StatusCode};

use crate::handlers::AppState;

/// GET /metrics handler
///
/// Returns metrics in Prometheus text exposition format, or 500 if the
/// encoder fails.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, String) {
    match state.metrics().export() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::error!(error = %e, "Failed to gather metrics for scraping");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {e}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support;

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let state = test_support::state();
        let (status, body) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty() || body.contains("polyroute"));
    }
}
