//! Health check endpoint
//!
//! Simple liveness check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Number of routable models in the registry
    pub enabled_models: usize,
    pub providers: usize,
}

/// GET /health handler
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let enabled_models = state.orchestrator().registry().list_enabled().len();
    let providers = state.config().providers.len();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            enabled_models,
            providers,
        }),
    )
}
