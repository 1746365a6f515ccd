//! Request orchestration
//!
//! Owns the attempt loop for `ask` requests: execute the routing plan,
//! validate each backend answer, and retry or escalate per the fallback
//! decision. Also fronts the comparison dispatcher. The orchestrator never
//! returns `Err` from `ask` or `compare`: every failure becomes an
//! error-carrying normalized response.

pub mod multi;

pub use multi::{CompareSlot, MultiModelOrchestrator};

use crate::client::{CompletionClient, CompletionOptions, HttpCompletionClient, Message};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::persist::RoutingRecorder;
use crate::response::{ErrorCode, MultiResponse, UnifiedResponse};
use crate::router::{
    AttemptRecord, AttemptStatus, ConstantReliability, FallbackManager, FallbackPolicy,
    ModelCandidate, ModelRegistry, ModelSelector, NextAction, PromptAnalyzer, ResponseValidator,
    RoutingConstraints, RoutingMode, SmartRouter, TierDecider,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One `ask` request after handler-level validation
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub prompt: String,
    pub context: Vec<Message>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub mode: RoutingMode,
    pub constraints: RoutingConstraints,
}

/// Routes, executes, validates, and records one request at a time
pub struct Orchestrator {
    router: SmartRouter,
    registry: Arc<ModelRegistry>,
    validator: ResponseValidator,
    fallback: FallbackManager,
    recorder: Arc<dyn RoutingRecorder>,
    metrics: Metrics,
    clients: HashMap<String, Arc<dyn CompletionClient>>,
    multi: MultiModelOrchestrator,
    default_policy: FallbackPolicy,
    request_timeout: Duration,
}

/// Build one HTTP client per enabled model, sharing a single reqwest pool.
///
/// A configured `api_key_env` that is absent from the environment is a
/// warning, not an error: local backends commonly need no key.
pub fn build_http_clients(
    config: &Config,
) -> AppResult<HashMap<String, Arc<dyn CompletionClient>>> {
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let mut clients: HashMap<String, Arc<dyn CompletionClient>> = HashMap::new();
    for (provider_name, provider) in &config.providers {
        let api_key = provider.api_key_env.as_ref().and_then(|env_name| {
            let key = std::env::var(env_name).ok();
            if key.is_none() {
                tracing::warn!(
                    provider = %provider_name,
                    env = %env_name,
                    "API key environment variable is not set; requests will be unauthenticated"
                );
            }
            key
        });

        for model in provider.models.iter().filter(|m| m.enabled) {
            let client = HttpCompletionClient::new(
                provider_name,
                &model.name,
                &provider.base_url,
                api_key.clone(),
                model.input_cost_per_1m,
                model.output_cost_per_1m,
                http.clone(),
            );
            clients.insert(format!("{provider_name}/{}", model.name), Arc::new(client));
        }
    }
    Ok(clients)
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        recorder: Arc<dyn RoutingRecorder>,
        metrics: Metrics,
        clients: HashMap<String, Arc<dyn CompletionClient>>,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::from_config(config));
        let selector = ModelSelector::new(
            Arc::new(ConstantReliability),
            config.routing.token_buffer,
        );
        let router = SmartRouter::new(
            Arc::clone(&registry),
            selector,
            PromptAnalyzer::new(),
            TierDecider::new(config.routing.thresholds),
        );

        let multi = MultiModelOrchestrator::new(
            Duration::from_secs(config.server.compare_timeout_seconds),
            metrics.clone(),
        );

        Self {
            router,
            registry,
            validator: ResponseValidator::new(config.routing.thresholds),
            fallback: FallbackManager::new(),
            recorder,
            metrics,
            clients,
            multi,
            default_policy: FallbackPolicy {
                max_attempts: config.routing.max_attempts,
                max_total_latency_ms: config.routing.max_total_latency_ms,
                allow_escalation: config.routing.allow_escalation,
            },
            request_timeout: Duration::from_secs(config.server.request_timeout_seconds),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Route one prompt to a backend and return the normalized response.
    pub async fn ask(&self, request: AskRequest) -> UnifiedResponse {
        let mut messages = request.context.clone();
        messages.push(Message::user(&request.prompt));

        let provider = normalized(&request.provider);
        let model = normalized(&request.model);

        match (provider, model) {
            (Some(provider), Some(model)) => self.ask_explicit(provider, model, &messages).await,
            (provider, _) => match request.mode {
                RoutingMode::Smart | RoutingMode::Cheap | RoutingMode::Strong => {
                    let mut constraints = request.constraints.clone();
                    // A bare provider override under smart routing becomes a
                    // soft preference rather than a direct dispatch.
                    if constraints.preferred_provider.is_none()
                        && let Some(provider) = provider
                    {
                        constraints.preferred_provider = Some(provider.to_string());
                    }
                    self.run_attempt_loop(&request.prompt, &request.context, request.mode, constraints)
                        .await
                }
                RoutingMode::Legacy => self.ask_legacy(provider, &messages).await,
            },
        }
    }

    /// Direct dispatch to a caller-named provider/model pair. Fails fast
    /// with `bad_request` before any backend call when the pair is unknown
    /// or disabled.
    async fn ask_explicit(
        &self,
        provider: &str,
        model: &str,
        messages: &[Message],
    ) -> UnifiedResponse {
        let candidate = match self.registry.find_model(provider, model) {
            Some(candidate) if candidate.enabled => candidate,
            Some(_) => {
                return UnifiedResponse::failure(
                    provider,
                    model,
                    ErrorCode::BadRequest,
                    format!("Model '{model}' for provider '{provider}' is currently disabled"),
                    false,
                    0,
                );
            }
            None => {
                return UnifiedResponse::failure(
                    provider,
                    model,
                    ErrorCode::BadRequest,
                    format!("Model '{model}' for provider '{provider}' is not configured"),
                    false,
                    0,
                );
            }
        };

        let mut response = self.invoke(&candidate, messages).await;

        let mut metadata = crate::router::RoutingMetadata::new("explicit", candidate.tier);
        metadata.attempt_count = 1;
        metadata.decision_reasons = vec!["explicit_model_selection".to_string()];
        metadata.candidate_plan = vec![candidate.label()];
        metadata.attempts.push(AttemptRecord {
            provider: candidate.provider.clone(),
            model: candidate.model_name.clone(),
            tier: candidate.tier,
            status: if response.is_success() {
                AttemptStatus::Ok
            } else {
                AttemptStatus::Failed
            },
            validation_reason: if response.is_success() {
                "ok".to_string()
            } else {
                "provider_error".to_string()
            },
            latency_ms: response.latency_ms,
        });

        self.hand_off_trail(response.request_id, &metadata);
        response.routing = Some(metadata);
        response
    }

    /// Legacy dispatch: provider required, model defaulted from the
    /// registry. Skips tiering and validation entirely.
    async fn ask_legacy(&self, provider: Option<&str>, messages: &[Message]) -> UnifiedResponse {
        let Some(provider) = provider else {
            return UnifiedResponse::failure(
                "orchestrator",
                "default",
                ErrorCode::BadRequest,
                "provider is required when routing_mode is not smart/cheap/strong",
                false,
                0,
            );
        };

        let Some(candidate) = self.registry.default_model(provider) else {
            return UnifiedResponse::failure(
                provider,
                "default",
                ErrorCode::BadRequest,
                format!("Provider '{provider}' has no enabled models configured"),
                false,
                0,
            );
        };

        self.invoke(&candidate, messages).await
    }

    /// Compare one prompt across caller-named provider/model pairs.
    ///
    /// Invalid pairs become pre-settled `bad_request` slots; valid slots
    /// run concurrently under per-slot timeouts.
    pub async fn compare(
        &self,
        prompt: &str,
        context: &[Message],
        targets: &[(String, String)],
        timeout: Option<Duration>,
    ) -> MultiResponse {
        let mut messages = context.to_vec();
        messages.push(Message::user(prompt));

        let slots = targets
            .iter()
            .map(|(provider, model)| {
                match self.registry.find_model(provider, model) {
                    Some(candidate) if candidate.enabled => {
                        match self.clients.get(&candidate.label()) {
                            Some(client) => CompareSlot::Client(Arc::clone(client)),
                            None => CompareSlot::Invalid(no_client_response(provider, model)),
                        }
                    }
                    Some(_) => CompareSlot::Invalid(UnifiedResponse::failure(
                        provider,
                        model,
                        ErrorCode::BadRequest,
                        format!("Model '{model}' for provider '{provider}' is currently disabled"),
                        false,
                        0,
                    )),
                    None => CompareSlot::Invalid(UnifiedResponse::failure(
                        provider,
                        model,
                        ErrorCode::BadRequest,
                        format!("Model '{model}' for provider '{provider}' is not configured"),
                        false,
                        0,
                    )),
                }
            })
            .collect();

        self.multi.compare(&messages, slots, timeout).await
    }

    /// Execute the smart routing plan: invoke, validate, and retry or
    /// escalate until a response passes or the budget runs out. On
    /// exhaustion the last backend response is returned unmodified (apart
    /// from the attached routing trail).
    async fn run_attempt_loop(
        &self,
        prompt: &str,
        context: &[Message],
        mode: RoutingMode,
        constraints: RoutingConstraints,
    ) -> UnifiedResponse {
        let started = Instant::now();

        let plan = match self.router.plan(prompt, context, mode, &constraints) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "Smart routing plan failed");
                return UnifiedResponse::failure(
                    "orchestrator",
                    "smart_router",
                    ErrorCode::Unknown,
                    e.to_string(),
                    false,
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        if let Err(e) = self
            .metrics
            .record_routing_duration(mode, started.elapsed().as_secs_f64() * 1000.0)
        {
            tracing::warn!(error = %e, "Failed to record routing duration");
        }

        let mut policy = self.default_policy;
        if let Some(budget) = constraints.max_total_latency_ms {
            policy.max_total_latency_ms = budget;
        }

        let features = plan.features;
        let mut metadata = plan.metadata;
        let mut current_tier = plan.tier;
        let mut candidates: VecDeque<Arc<ModelCandidate>> = plan.candidates.into();

        let mut messages = context.to_vec();
        messages.push(Message::user(prompt));

        let mut attempt_index: u32 = 0;
        let mut last_response: Option<UnifiedResponse> = None;
        let mut final_response: Option<UnifiedResponse> = None;

        while attempt_index < policy.max_attempts {
            let Some(candidate) = candidates.pop_front() else {
                // Tier drained without a verdict: move up the ladder and
                // re-rank, or give up at the top.
                let Some(next_tier) = self.registry.next_tier(current_tier) else {
                    break;
                };
                current_tier = next_tier;
                match self.reselect(current_tier, &features, &constraints, mode, &mut metadata) {
                    Some(reselected) => candidates = reselected,
                    None => break,
                }
                continue;
            };

            let response = self.invoke(&candidate, &messages).await;
            let validation = self.validator.validate(&features, &constraints, &response);

            metadata.attempts.push(AttemptRecord {
                provider: candidate.provider.clone(),
                model: candidate.model_name.clone(),
                tier: current_tier,
                status: if validation.ok {
                    AttemptStatus::Ok
                } else {
                    AttemptStatus::Failed
                },
                validation_reason: validation.reason.as_str().to_string(),
                latency_ms: response.latency_ms,
            });
            if let Err(e) = self
                .metrics
                .record_attempt(current_tier, validation.reason.as_str())
            {
                tracing::warn!(error = %e, "Failed to record attempt metric");
            }

            if validation.ok {
                final_response = Some(response);
                break;
            }

            tracing::info!(
                provider = %candidate.provider,
                model = %candidate.model_name,
                tier = %current_tier,
                attempt = attempt_index + 1,
                reason = validation.reason.as_str(),
                "Attempt failed validation"
            );

            let elapsed_ms = started.elapsed().as_millis() as u64;
            let decision = self.fallback.decide(
                current_tier,
                &validation,
                attempt_index,
                elapsed_ms,
                candidates.len(),
                &policy,
                |tier| self.registry.next_tier(tier),
            );

            match decision.action {
                NextAction::RetrySameTier => {
                    metadata.fallback_used = true;
                    metadata
                        .decision_reasons
                        .push(format!("retry_same_tier:{}", decision.reason));
                    last_response = Some(response);
                    attempt_index += 1;
                }
                NextAction::EscalateTier => {
                    // decide() only returns EscalateTier with a tier set.
                    let Some(next_tier) = decision.next_tier else {
                        final_response = Some(response);
                        break;
                    };
                    if let Err(e) = self.metrics.record_escalation(current_tier, next_tier) {
                        tracing::warn!(error = %e, "Failed to record escalation metric");
                    }
                    metadata.fallback_used = true;
                    metadata
                        .decision_reasons
                        .push(format!("escalate:{}", decision.reason));
                    current_tier = next_tier;
                    match self.reselect(current_tier, &features, &constraints, mode, &mut metadata)
                    {
                        Some(reselected) => {
                            candidates = reselected;
                            last_response = Some(response);
                            attempt_index += 1;
                        }
                        None => {
                            final_response = Some(response);
                            break;
                        }
                    }
                }
                NextAction::Stop => {
                    metadata
                        .decision_reasons
                        .push(format!("stop:{}", decision.reason));
                    final_response = Some(response);
                    break;
                }
            }
        }

        let mut response = match final_response.or(last_response) {
            Some(response) => response,
            None => UnifiedResponse::failure(
                "orchestrator",
                "smart_router",
                ErrorCode::Unknown,
                "No available model candidates",
                false,
                started.elapsed().as_millis() as u64,
            ),
        };

        metadata.attempt_count = metadata.attempts.len() as u32;
        metadata.final_tier = current_tier;

        if let Err(e) = self.metrics.record_request(mode, current_tier) {
            tracing::warn!(error = %e, "Failed to record request metric");
        }

        self.hand_off_trail(response.request_id, &metadata);
        response.routing = Some(metadata);
        response
    }

    /// Re-rank candidates at a new tier mid-flight. Relaxation markers from
    /// the fresh selection are appended to the existing trail.
    fn reselect(
        &self,
        tier: crate::router::Tier,
        features: &crate::router::PromptFeatures,
        constraints: &RoutingConstraints,
        mode: RoutingMode,
        metadata: &mut crate::router::RoutingMetadata,
    ) -> Option<VecDeque<Arc<ModelCandidate>>> {
        match self
            .router
            .select_at_tier(tier, features, constraints, mode, Vec::new())
        {
            Ok(plan) => {
                metadata
                    .decision_reasons
                    .extend(plan.metadata.decision_reasons);
                Some(plan.candidates.into())
            }
            Err(e) => {
                tracing::warn!(tier = %tier, error = %e, "No candidates at escalation tier");
                None
            }
        }
    }

    async fn invoke(&self, candidate: &ModelCandidate, messages: &[Message]) -> UnifiedResponse {
        let Some(client) = self.clients.get(&candidate.label()) else {
            tracing::error!(
                candidate = %candidate.label(),
                "No client configured for candidate"
            );
            return no_client_response(&candidate.provider, &candidate.model_name);
        };

        let options = CompletionOptions {
            timeout: self.request_timeout,
            ..Default::default()
        };
        client.get_completion(messages, &options).await
    }

    /// Hand the finished trail to the recorder without waiting on it.
    fn hand_off_trail(&self, request_id: uuid::Uuid, metadata: &crate::router::RoutingMetadata) {
        let recorder = Arc::clone(&self.recorder);
        let metadata = metadata.clone();
        tokio::spawn(async move {
            recorder.record(request_id, &metadata).await;
        });
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn no_client_response(provider: &str, model: &str) -> UnifiedResponse {
    UnifiedResponse::failure(
        provider,
        model,
        ErrorCode::Unknown,
        format!("No client configured for {provider}/{model}"),
        false,
        0,
    )
}
