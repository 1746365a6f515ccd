//! Routing logic for Polyroute
//!
//! Composes prompt analysis, tier decision, candidate selection, response
//! validation, and fallback handling into a routing plan for each request.

pub mod analyzer;
pub mod fallback;
pub mod registry;
pub mod selector;
pub mod smart;
pub mod tier_decider;
pub mod validator;

pub use analyzer::PromptAnalyzer;
pub use fallback::{FallbackDecision, FallbackManager, FallbackPolicy, NextAction};
pub use registry::{ModelCandidate, ModelRegistry};
pub use selector::{ConstantReliability, ModelSelector, ReliabilityStore, SelectionResult};
pub use smart::{RoutingPlan, SmartRouter};
pub use tier_decider::TierDecider;
pub use validator::{ResponseValidator, ValidationReason, ValidationResult, ValidationSeverity};

use serde::{Deserialize, Serialize};

/// Cost/quality tier ladder
///
/// The numeric order here is the default escalation order; the effective
/// order at runtime comes from the registry's configured `tier_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    T0,
    T1,
    T2,
    T3,
}

impl Tier {
    /// Convert to string representation for logging and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T0 => "t0",
            Self::T1 => "t1",
            Self::T2 => "t2",
            Self::T3 => "t3",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "t0" => Ok(Self::T0),
            "t1" => Ok(Self::T1),
            "t2" => Ok(Self::T2),
            "t3" => Ok(Self::T3),
            other => Err(format!("unknown tier '{other}' (expected t0..t3)")),
        }
    }
}

/// Coarse prompt intent, decided by a first-match priority cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Rewrite,
    Summarize,
    Bullets,
    Brainstorm,
    Code,
    Analysis,
    #[default]
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rewrite => "rewrite",
            Self::Summarize => "summarize",
            Self::Bullets => "bullets",
            Self::Brainstorm => "brainstorm",
            Self::Code => "code",
            Self::Analysis => "analysis",
            Self::General => "general",
        }
    }

    /// Rewrite-class intents are eligible for the cheap tier when short.
    pub fn is_short_simple_class(&self) -> bool {
        matches!(
            self,
            Self::Rewrite | Self::Summarize | Self::Bullets | Self::Brainstorm
        )
    }
}

/// Cheap lexical signals extracted from a prompt, no I/O
///
/// Produced once per request by [`PromptAnalyzer`] and consumed by the
/// tier decider, selector, and validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFeatures {
    pub word_count: u64,
    pub char_count: u64,
    /// `max(words * 1.3, chars / 4)`, floored
    pub token_estimate: u64,
    pub has_code: bool,
    pub has_math: bool,
    pub has_analysis: bool,
    pub has_creative: bool,
    pub has_factual: bool,
    pub strict_format: bool,
    pub has_logs_stacktrace: bool,
    pub has_strict_constraints: bool,
    pub needs_latest_info: bool,
    pub needs_accuracy: bool,
    pub is_follow_up: bool,
    pub context_token_estimate: u64,
    pub context_messages: u64,
    pub intent: Intent,
}

/// Output of the tier decider: a tier plus the rule names that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDecision {
    pub tier: Tier,
    pub reasons: Vec<String>,
}

impl TierDecision {
    pub fn new(tier: Tier, reason: impl Into<String>) -> Self {
        Self {
            tier,
            reasons: vec![reason.into()],
        }
    }
}

/// How the caller wants the request routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    #[default]
    Smart,
    Cheap,
    Strong,
    Legacy,
}

impl RoutingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Cheap => "cheap",
            Self::Strong => "strong",
            Self::Legacy => "legacy",
        }
    }
}

/// Per-request routing constraints supplied by the caller
///
/// All fields are optional overrides on top of the registry defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConstraints {
    pub max_cost_usd: Option<f64>,
    pub max_total_latency_ms: Option<u64>,
    pub preferred_provider: Option<String>,
    pub allowed_providers: Option<Vec<String>>,
    pub min_context_limit: Option<u64>,
    #[serde(default)]
    pub strict_format: bool,
    #[serde(default)]
    pub json_only: bool,
}

/// Outcome of one backend attempt, recorded in order by the attempt loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub model: String,
    pub tier: Tier,
    pub status: AttemptStatus,
    /// Validation verdict for this attempt ("ok" on success)
    pub validation_reason: String,
    pub latency_ms: u64,
}

/// Whether a single attempt passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Ok,
    Failed,
}

/// Routing trail attached to the final response
///
/// Write-once accumulator owned by the attempt loop. Handed off to the
/// persistence sink after the response is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingMetadata {
    pub mode: String,
    pub initial_tier: Tier,
    pub final_tier: Tier,
    pub attempt_count: u32,
    pub fallback_used: bool,
    pub attempts: Vec<AttemptRecord>,
    /// Rule names and relaxation markers, in the order they fired
    pub decision_reasons: Vec<String>,
    /// Ranked `provider/model` pairs from the initial selection
    pub candidate_plan: Vec<String>,
}

impl RoutingMetadata {
    /// Start a trail at the planned tier before any attempt runs.
    pub fn new(mode: impl Into<String>, initial_tier: Tier) -> Self {
        Self {
            mode: mode.into(),
            initial_tier,
            final_tier: initial_tier,
            attempt_count: 0,
            fallback_used: false,
            attempts: Vec::new(),
            decision_reasons: Vec::new(),
            candidate_plan: Vec::new(),
        }
    }
}
