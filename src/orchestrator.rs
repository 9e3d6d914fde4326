//! Execution orchestration and the public router facade.
//!
//! [`RequestRouter`] ties the pieces together: classify, route, execute
//! against the chosen provider, and make at most one fallback attempt
//! against the alternate. Health and statistics updates happen strictly
//! after each awaited provider call returns, so a cancelled request
//! (dropped future) abandons the in-flight attempt without touching either.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::health::{HealthTracker, ProviderSnapshot};
use crate::provider::{LocalClient, ProviderFailure, RemoteClient};
use crate::router::{Classifier, RouteReason, RoutingEngine};
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::types::{Outcome, ProviderId, RequestContext, RouterResponse};

/// Completion budget when the caller does not set one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Result of probing a single provider, for `test_providers`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connectivity report for both providers.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub local: ProbeResult,
    pub remote: ProbeResult,
}

/// Health snapshots for both providers.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub local: ProviderSnapshot,
    pub remote: ProviderSnapshot,
}

/// The AI request router: decides which provider serves each request,
/// executes the call, and fails over once when the choice turns out bad.
pub struct RequestRouter {
    classifier: Classifier,
    engine: RoutingEngine,
    health: Arc<HealthTracker>,
    stats: Arc<StatsRecorder>,
    local: LocalClient,
    remote: RemoteClient,
    fallback_enabled: bool,
    configured_local_model: String,
}

impl RequestRouter {
    /// Build a router and run the start-up probe against the local provider.
    ///
    /// Probe failure is not an error: it leaves the local provider marked
    /// unreachable and the router fully usable. The only failure mode here
    /// is HTTP client construction.
    pub async fn connect(config: Config) -> Result<Self> {
        let local = LocalClient::new(&config.local)?;
        let remote = RemoteClient::new(&config.remote)?;
        let health = Arc::new(HealthTracker::new(
            config.router.unreachable_after,
            config.local.model.clone(),
        ));

        let router = Self {
            classifier: Classifier::new(&config.classifier),
            engine: RoutingEngine::new(config.router.primary),
            health,
            stats: Arc::new(StatsRecorder::new()),
            local,
            remote,
            fallback_enabled: config.router.fallback_enabled,
            configured_local_model: config.local.model.clone(),
        };

        router.refresh_local_connection().await;
        Ok(router)
    }

    /// Route and execute one request.
    pub async fn complete(&self, ctx: RequestContext) -> Result<RouterResponse> {
        let request_id = uuid::Uuid::new_v4();
        let started = Instant::now();

        let classification = self.classifier.classify(&ctx);
        let decision = self.engine.route(
            &classification,
            &self.health.snapshot(ProviderId::Local),
            &self.health.snapshot(ProviderId::Remote),
        );

        tracing::info!(
            request_id = %request_id,
            provider = %decision.provider,
            reason = %decision.reason,
            "routed request"
        );

        let max_tokens = ctx.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let primary = decision.provider;

        let (primary_outcome, primary_result) = self.attempt(primary, &ctx, max_tokens).await;

        let primary_failure = match primary_result {
            Ok(text) => {
                self.stats
                    .observe(&decision, &[primary_outcome], ctx.char_count());
                return Ok(RouterResponse {
                    text,
                    provider: primary,
                    routing_reason: decision.reason.to_string(),
                    fallback_used: false,
                    original_provider: None,
                    latency_ms: started.elapsed().as_millis() as u64,
                });
            }
            Err(failure) => failure,
        };

        let alternate = primary.other();
        let alternate_snapshot = self.health.snapshot(alternate);
        // A last-resort decision means both providers were already known
        // bad; the second attempt is the only remaining hope and the caller
        // is owed both causes. A credit-exhausted remote is still off
        // limits even then.
        let alternate_usable = alternate_snapshot.reachable
            || matches!(decision.reason, RouteReason::LastResort);
        let credit_blocked =
            alternate == ProviderId::Remote && alternate_snapshot.credit_exhausted;

        if !(self.fallback_enabled && alternate_usable && !credit_blocked) {
            tracing::warn!(
                request_id = %request_id,
                provider = %primary,
                class = %primary_failure.class,
                fallback_enabled = self.fallback_enabled,
                alternate_usable,
                "request failed with no eligible fallback"
            );
            self.stats
                .observe(&decision, &[primary_outcome], ctx.char_count());
            return Err(Error::Provider {
                provider: primary,
                class: primary_failure.class,
                message: primary_failure.message,
            });
        }

        tracing::warn!(
            request_id = %request_id,
            from = %primary,
            to = %alternate,
            class = %primary_failure.class,
            "primary attempt failed, trying fallback"
        );

        let (fallback_outcome, fallback_result) = self.attempt(alternate, &ctx, max_tokens).await;

        match fallback_result {
            Ok(text) => {
                self.stats.observe(
                    &decision,
                    &[primary_outcome, fallback_outcome],
                    ctx.char_count(),
                );
                Ok(RouterResponse {
                    text,
                    provider: alternate,
                    routing_reason: decision.reason.to_string(),
                    fallback_used: true,
                    original_provider: Some(primary),
                    latency_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(fallback_failure) => {
                self.stats.observe(
                    &decision,
                    &[primary_outcome, fallback_outcome],
                    ctx.char_count(),
                );
                Err(Error::BothProvidersFailed {
                    primary_provider: primary,
                    primary_class: primary_failure.class,
                    primary_message: primary_failure.message,
                    fallback_provider: alternate,
                    fallback_class: fallback_failure.class,
                    fallback_message: fallback_failure.message,
                })
            }
        }
    }

    /// One provider attempt. Health updates run only after the awaited call
    /// returns, never for an abandoned in-flight attempt.
    async fn attempt(
        &self,
        provider: ProviderId,
        ctx: &RequestContext,
        max_tokens: u32,
    ) -> (Outcome, std::result::Result<String, ProviderFailure>) {
        let attempt_started = Instant::now();

        let result = match provider {
            ProviderId::Local => {
                let model = self.health.local_model();
                self.local
                    .generate(&model, &ctx.flattened_prompt(), max_tokens)
                    .await
            }
            ProviderId::Remote => self.remote.complete(&ctx.messages, max_tokens).await,
        };

        let latency_ms = attempt_started.elapsed().as_millis() as u64;
        let outcome = match &result {
            Ok(_) => {
                self.health.record_success(provider, latency_ms);
                Outcome {
                    provider,
                    success: true,
                    latency_ms,
                    error_class: None,
                }
            }
            Err(failure) => {
                self.health
                    .record_failure(provider, failure.class, attempt_started);
                Outcome {
                    provider,
                    success: false,
                    latency_ms,
                    error_class: Some(failure.class),
                }
            }
        };

        (outcome, result)
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.report()
    }

    /// Administrative counter reset.
    pub fn clear_stats(&self) {
        self.stats.clear();
    }

    /// Clear the sticky remote credit-exhaustion flag. Invoke out-of-band
    /// after confirming billing was restored.
    pub fn reset_credit_exhaustion(&self) {
        self.health.reset_credit_exhaustion();
    }

    /// Health snapshots for both providers.
    pub fn health(&self) -> HealthReport {
        HealthReport {
            local: self.health.snapshot(ProviderId::Local),
            remote: self.health.snapshot(ProviderId::Remote),
        }
    }

    /// Re-run the local capability probe. On success the local provider is
    /// marked reachable and the configured model is substituted with an
    /// installed one when missing. Returns the resulting reachability.
    pub async fn refresh_local_connection(&self) -> bool {
        match self.local.list_models().await {
            Ok(models) => {
                self.health.set_reachable(ProviderId::Local, true);
                if models.iter().any(|m| *m == self.configured_local_model) {
                    self.health
                        .set_local_model(self.configured_local_model.clone());
                } else if let Some(first) = models.first() {
                    tracing::warn!(
                        configured = %self.configured_local_model,
                        substitute = %first,
                        "configured local model not installed, substituting"
                    );
                    self.health.set_local_model(first.clone());
                }
                true
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "local provider probe failed");
                self.health.set_reachable(ProviderId::Local, false);
                false
            }
        }
    }

    /// Probe both providers concurrently. Reports reachability, latency and
    /// error per provider without writing to the health tracker, so a probe
    /// never perturbs routing state.
    pub async fn test_providers(&self) -> ProbeReport {
        let local_probe = async {
            let started = Instant::now();
            match self.local.list_models().await {
                Ok(_) => ProbeResult {
                    reachable: true,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: None,
                },
                Err(failure) => ProbeResult {
                    reachable: false,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: Some(failure.to_string()),
                },
            }
        };
        let remote_probe = async {
            let started = Instant::now();
            match self.remote.probe().await {
                Ok(()) => ProbeResult {
                    reachable: true,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: None,
                },
                Err(failure) => ProbeResult {
                    reachable: false,
                    latency_ms: started.elapsed().as_millis() as u64,
                    error: Some(failure.to_string()),
                },
            }
        };

        let (local, remote) = tokio::join!(local_probe, remote_probe);
        ProbeReport { local, remote }
    }
}
