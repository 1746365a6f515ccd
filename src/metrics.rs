//! Prometheus metrics collection for Polyroute
//!
//! Tracks request counts by mode and tier, attempt outcomes, tier
//! escalations, compare slot outcomes, and routing-plan latency.
//! Exposed via the `/metrics` endpoint in Prometheus text format.
//!
//! All label values come from closed enums (RoutingMode, Tier, validation
//! reasons), keeping time-series cardinality bounded.

use crate::router::{RoutingMode, Tier};
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Outcome label for one compare slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareSlotOutcome {
    Success,
    Timeout,
    Error,
}

impl CompareSlotOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

/// Metrics collector for Polyroute
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    requests_total: CounterVec,
    attempts_total: CounterVec,
    escalations_total: IntCounterVec,
    compare_slots_total: CounterVec,
    routing_duration: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance and register all metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g. duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 4 modes x 4 tiers = 16 time series
        let requests_total = CounterVec::new(
            Opts::new(
                "polyroute_requests_total",
                "Total ask requests by routing mode and final tier",
            ),
            &["mode", "tier"],
        )?;

        // Cardinality: 4 tiers x 8 validation reasons = 32 time series
        let attempts_total = CounterVec::new(
            Opts::new(
                "polyroute_attempts_total",
                "Backend attempts by tier and validation outcome",
            ),
            &["tier", "outcome"],
        )?;

        // Cardinality: at most 4 x 4 tier pairs
        let escalations_total = IntCounterVec::new(
            Opts::new(
                "polyroute_escalations_total",
                "Tier escalations by source and destination tier",
            ),
            &["from_tier", "to_tier"],
        )?;

        let compare_slots_total = CounterVec::new(
            Opts::new(
                "polyroute_compare_slots_total",
                "Compare slot results by outcome (success/timeout/error)",
            ),
            &["outcome"],
        )?;

        // Planning is pure CPU work; buckets are sub-millisecond heavy.
        let routing_duration = HistogramVec::new(
            HistogramOpts::new(
                "polyroute_routing_duration_ms",
                "Routing plan latency in milliseconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0]),
            &["mode"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(escalations_total.clone()))?;
        registry.register(Box::new(compare_slots_total.clone()))?;
        registry.register(Box::new(routing_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            attempts_total,
            escalations_total,
            compare_slots_total,
            routing_duration,
        })
    }

    pub fn record_request(&self, mode: RoutingMode, tier: Tier) -> Result<(), prometheus::Error> {
        self.requests_total
            .get_metric_with_label_values(&[mode.as_str(), tier.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_attempt(&self, tier: Tier, outcome: &str) -> Result<(), prometheus::Error> {
        self.attempts_total
            .get_metric_with_label_values(&[tier.as_str(), outcome])?
            .inc();
        Ok(())
    }

    pub fn record_escalation(&self, from: Tier, to: Tier) -> Result<(), prometheus::Error> {
        self.escalations_total
            .get_metric_with_label_values(&[from.as_str(), to.as_str()])?
            .inc();
        Ok(())
    }

    pub fn record_compare_slot(
        &self,
        outcome: CompareSlotOutcome,
    ) -> Result<(), prometheus::Error> {
        self.compare_slots_total
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Record routing plan duration. Rejects NaN/infinite/negative values,
    /// which would corrupt histogram percentiles.
    pub fn record_routing_duration(
        &self,
        mode: RoutingMode,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {duration_ms}"
            )));
        }

        self.routing_duration
            .get_metric_with_label_values(&[mode.as_str()])?
            .observe(duration_ms);
        Ok(())
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("metrics were not valid UTF-8: {e}")))
    }
}
