//! Polyroute - model-routing gateway for interchangeable LLM backends
//!
//! This library routes a prompt to the most appropriate backend model by
//! extracting cheap prompt signals, deciding a cost/quality tier, ranking
//! candidates within that tier, and validating the backend's answer with
//! retry/escalation fallback. It also provides a concurrent comparison
//! dispatcher that fans one prompt out to several backends at once.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod persist;
pub mod response;
pub mod router;
pub mod telemetry;
