//! Per-provider health tracking.
//!
//! The tracker owns all live provider state: reachability, consecutive
//! failure streaks, the sticky remote credit-exhaustion flag, and a rolling
//! latency average. Routing reads it only through [`ProviderSnapshot`]s.
//!
//! Two concurrency contracts matter here:
//! - `credit_exhausted` is set-once under the provider's lock and cleared
//!   only by [`HealthTracker::reset_credit_exhaustion`]. A later success on
//!   the remote provider clears the failure streak but never this flag.
//! - Success takes precedence over a racing failure: a failure whose attempt
//!   began before the most recent success is recorded as a timestamp only
//!   and does not touch the streak or reachability.

use std::sync::Mutex;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::ErrorClass;
use crate::types::ProviderId;

/// EMA weights for the rolling latency average, favoring recent samples.
const LATENCY_EMA_OLD: f64 = 0.8;
const LATENCY_EMA_NEW: f64 = 0.2;

/// Live state for a single provider (not thread-safe on its own).
struct ProviderHealth {
    reachable: bool,
    credit_exhausted: bool,
    consecutive_failures: u32,
    last_success_at: Option<Instant>,
    last_failure_at: Option<Instant>,
    avg_latency_ms: Option<f64>,
    last_error: Option<ErrorClass>,
}

impl ProviderHealth {
    fn new(reachable: bool) -> Self {
        Self {
            reachable,
            credit_exhausted: false,
            consecutive_failures: 0,
            last_success_at: None,
            last_failure_at: None,
            avg_latency_ms: None,
            last_error: None,
        }
    }
}

/// Read-only copy of a provider's health state.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub provider: ProviderId,
    pub reachable: bool,
    pub credit_exhausted: bool,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorClass>,
    #[serde(skip)]
    pub last_success_at: Option<Instant>,
    #[serde(skip)]
    pub last_failure_at: Option<Instant>,
}

/// Health state for the fixed local/remote provider pair.
///
/// The provider set is intentionally closed, so this holds two named slots
/// rather than a keyed registry; each slot has its own mutex, so updates to
/// one provider never contend with the other.
pub struct HealthTracker {
    local: Mutex<ProviderHealth>,
    remote: Mutex<ProviderHealth>,
    /// Local model in use; the start-up probe may substitute the configured
    /// default for one that is actually installed.
    local_model: Mutex<String>,
    unreachable_after: u32,
}

impl HealthTracker {
    /// Create a tracker. The local provider starts unreachable until the
    /// start-up probe succeeds; the remote provider is assumed reachable
    /// until proven otherwise.
    pub fn new(unreachable_after: u32, local_model: String) -> Self {
        Self {
            local: Mutex::new(ProviderHealth::new(false)),
            remote: Mutex::new(ProviderHealth::new(true)),
            local_model: Mutex::new(local_model),
            unreachable_after: unreachable_after.max(1),
        }
    }

    fn slot(&self, provider: ProviderId) -> &Mutex<ProviderHealth> {
        match provider {
            ProviderId::Local => &self.local,
            ProviderId::Remote => &self.remote,
        }
    }

    /// Record a successful attempt: reset the failure streak, restore
    /// reachability, and fold the sample into the latency average.
    ///
    /// Does NOT clear `credit_exhausted` -- billing recovery is not locally
    /// observable, so only an explicit reset does.
    pub fn record_success(&self, provider: ProviderId, latency_ms: u64) {
        let mut health = self.slot(provider).lock().unwrap();
        health.consecutive_failures = 0;
        health.reachable = true;
        health.last_success_at = Some(Instant::now());
        let sample = latency_ms as f64;
        health.avg_latency_ms = Some(match health.avg_latency_ms {
            Some(old) => old * LATENCY_EMA_OLD + sample * LATENCY_EMA_NEW,
            None => sample,
        });

        tracing::debug!(
            provider = %provider,
            latency_ms,
            avg_latency_ms = health.avg_latency_ms,
            "provider success recorded",
        );
    }

    /// Record a failed attempt that started at `started_at`.
    ///
    /// A failure racing with a newer success (the attempt began before
    /// `last_success_at`) updates `last_failure_at` only; the success keeps
    /// its streak reset. Remote `credit_exhausted` failures set the sticky
    /// flag either way.
    pub fn record_failure(&self, provider: ProviderId, class: ErrorClass, started_at: Instant) {
        let mut health = self.slot(provider).lock().unwrap();
        health.last_failure_at = Some(Instant::now());
        health.last_error = Some(class);

        if provider == ProviderId::Remote
            && class == ErrorClass::CreditExhausted
            && !health.credit_exhausted
        {
            health.credit_exhausted = true;
            tracing::warn!(
                provider = %provider,
                "remote credit exhausted: flag is sticky until explicitly reset",
            );
        }

        let superseded = health
            .last_success_at
            .map_or(false, |success_at| success_at >= started_at);
        if superseded {
            tracing::debug!(
                provider = %provider,
                class = %class,
                "stale failure superseded by newer success; streak unchanged",
            );
            return;
        }

        health.consecutive_failures += 1;
        if health.consecutive_failures >= self.unreachable_after && health.reachable {
            health.reachable = false;
            tracing::warn!(
                provider = %provider,
                class = %class,
                consecutive_failures = health.consecutive_failures,
                "provider marked unreachable",
            );
        }
    }

    /// Read-only snapshot used by the routing engine.
    pub fn snapshot(&self, provider: ProviderId) -> ProviderSnapshot {
        let health = self.slot(provider).lock().unwrap();
        ProviderSnapshot {
            provider,
            reachable: health.reachable,
            credit_exhausted: health.credit_exhausted,
            consecutive_failures: health.consecutive_failures,
            avg_latency_ms: health.avg_latency_ms,
            last_error: health.last_error,
            last_success_at: health.last_success_at,
            last_failure_at: health.last_failure_at,
        }
    }

    /// The only way to clear the sticky remote credit-exhaustion flag.
    /// Callers invoke this out-of-band after confirming billing recovery.
    pub fn reset_credit_exhaustion(&self) {
        let mut remote = self.remote.lock().unwrap();
        if remote.credit_exhausted {
            remote.credit_exhausted = false;
            tracing::info!("remote credit-exhaustion flag cleared by explicit reset");
        }
    }

    /// Set reachability directly. Used by the start-up/refresh probe, which
    /// learns about the local provider without a request cycle.
    pub fn set_reachable(&self, provider: ProviderId, reachable: bool) {
        let mut health = self.slot(provider).lock().unwrap();
        health.reachable = reachable;
        if reachable {
            health.consecutive_failures = 0;
        }
    }

    /// The local model currently in use.
    pub fn local_model(&self) -> String {
        self.local_model.lock().unwrap().clone()
    }

    /// Record the model discovered by the capability probe.
    pub fn set_local_model(&self, model: String) {
        let mut current = self.local_model.lock().unwrap();
        if *current != model {
            tracing::info!(from = %current, to = %model, "local model updated");
            *current = model;
        }
    }
}
