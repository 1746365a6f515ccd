//! Backend completion clients
//!
//! The `CompletionClient` trait is the seam between routing and transport.
//! Implementations never return `Err`: every failure mode is normalized
//! into an error-carrying [`UnifiedResponse`] so the orchestrator treats
//! all backends uniformly.

pub mod http;

pub use http::HttpCompletionClient;

use crate::response::UnifiedResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message in the conversation sent to a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation options
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A backend that turns messages into a normalized response
///
/// Implementations must be infallible at the signature level: transport
/// and provider failures come back as `UnifiedResponse` values with the
/// `error` field set.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider name as configured in the registry
    fn provider(&self) -> &str;

    /// Model name this client targets
    fn model(&self) -> &str;

    async fn get_completion(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> UnifiedResponse;
}
