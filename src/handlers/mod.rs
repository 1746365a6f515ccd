//! HTTP request handlers for the Polyroute API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::orchestrator::{Orchestrator, build_http_clients};
use crate::persist::LogRecorder;
use std::sync::Arc;

pub mod ask;
pub mod compare;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<Orchestrator>,
    metrics: Metrics,
}

impl AppState {
    /// Build the shared state from validated configuration.
    pub fn new(config: Config) -> AppResult<Self> {
        let metrics = Metrics::new()
            .map_err(|e| AppError::Internal(format!("Failed to register metrics: {e}")))?;
        let clients = build_http_clients(&config)?;
        let orchestrator = Arc::new(Orchestrator::new(
            &config,
            Arc::new(LogRecorder),
            metrics.clone(),
            clients,
        ));

        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn state() -> AppState {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8088

            [providers.alpha]
            base_url = "http://alpha.test/v1"

            [[providers.alpha.models]]
            name = "alpha-cheap"
            tier = "t0"
            input_cost_per_1m = 0.05
            output_cost_per_1m = 0.1
            context_limit = 32000
            tags = ["cheap"]

            [[providers.alpha.models]]
            name = "alpha-mid"
            tier = "t1"
            input_cost_per_1m = 0.3
            output_cost_per_1m = 1.2
            context_limit = 128000

            [[providers.alpha.models]]
            name = "alpha-off"
            tier = "t1"
            input_cost_per_1m = 0.3
            output_cost_per_1m = 1.2
            context_limit = 128000
            enabled = false
            "#,
        )
        .expect("test config should parse");
        config.validate().expect("test config should validate");
        AppState::new(config).expect("state should build")
    }
}
