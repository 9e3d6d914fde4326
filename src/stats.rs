//! In-memory request statistics.
//!
//! Counters are lock-free atomics: two requests may race on the same bucket
//! and approximate counts are acceptable here (unlike health state, which
//! has stricter rules). Counters are monotonic until an explicit `clear()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::router::RoutingDecision;
use crate::types::{Outcome, ProviderId};

/// Rough token estimate divisor: characters / 4. Approximate by design --
/// good enough for a savings estimate, not billing-accurate.
pub const ESTIMATED_CHARS_PER_TOKEN: u64 = 4;

/// Fixed remote price per 1000 estimated tokens, in USD, used to value
/// requests the local provider absorbed.
pub const REMOTE_COST_PER_1K_TOKENS: f64 = 0.015;

/// Accumulates routing outcomes. One instance per router, injected at
/// construction so tests get a fresh recorder per case.
pub struct StatsRecorder {
    total_requests: AtomicU64,
    local_requests: AtomicU64,
    remote_requests: AtomicU64,
    local_errors: AtomicU64,
    remote_errors: AtomicU64,
    fallbacks: AtomicU64,
    specialized_requests: AtomicU64,
    chars_served_locally: AtomicU64,
    since: Mutex<DateTime<Utc>>,
}

/// Read-only statistics snapshot with derived rates.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub since: String,
    pub generated_at: String,
    pub total_requests: u64,
    pub local_requests: u64,
    pub remote_requests: u64,
    pub local_errors: u64,
    pub remote_errors: u64,
    pub fallbacks: u64,
    pub specialized_requests: u64,
    /// Share of served requests handled locally, in percent.
    pub local_share_pct: f64,
    /// Share of all requests classified as specialization, in percent.
    pub specialization_rate_pct: f64,
    pub estimated_tokens_served_locally: u64,
    /// Estimated remote spend avoided by local serving. Rough estimate.
    pub estimated_cost_saved_usd: f64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            local_requests: AtomicU64::new(0),
            remote_requests: AtomicU64::new(0),
            local_errors: AtomicU64::new(0),
            remote_errors: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            specialized_requests: AtomicU64::new(0),
            chars_served_locally: AtomicU64::new(0),
            since: Mutex::new(Utc::now()),
        }
    }

    /// Record one completed request cycle: the decision plus its one or two
    /// execution outcomes.
    ///
    /// Usage counts credit only the provider that produced the data; failed
    /// attempts land in the per-provider error tallies instead.
    pub fn observe(&self, decision: &RoutingDecision, outcomes: &[Outcome], request_chars: usize) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if decision.reason.is_specialization() {
            self.specialized_requests.fetch_add(1, Ordering::Relaxed);
        }

        if outcomes.len() >= 2 {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        for outcome in outcomes {
            if !outcome.success {
                match outcome.provider {
                    ProviderId::Local => &self.local_errors,
                    ProviderId::Remote => &self.remote_errors,
                }
                .fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(served) = outcomes.iter().find(|o| o.success) {
            match served.provider {
                ProviderId::Local => {
                    self.local_requests.fetch_add(1, Ordering::Relaxed);
                    self.chars_served_locally
                        .fetch_add(request_chars as u64, Ordering::Relaxed);
                }
                ProviderId::Remote => {
                    self.remote_requests.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Read-only snapshot. Never mutates state.
    pub fn report(&self) -> StatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let local = self.local_requests.load(Ordering::Relaxed);
        let remote = self.remote_requests.load(Ordering::Relaxed);
        let specialized = self.specialized_requests.load(Ordering::Relaxed);
        let chars_local = self.chars_served_locally.load(Ordering::Relaxed);

        let served = local + remote;
        let local_share_pct = if served > 0 {
            local as f64 / served as f64 * 100.0
        } else {
            0.0
        };
        let specialization_rate_pct = if total > 0 {
            specialized as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let estimated_tokens = chars_local / ESTIMATED_CHARS_PER_TOKEN;
        let estimated_cost_saved_usd =
            estimated_tokens as f64 / 1000.0 * REMOTE_COST_PER_1K_TOKENS;

        StatsSnapshot {
            since: self.since.lock().unwrap().to_rfc3339(),
            generated_at: Utc::now().to_rfc3339(),
            total_requests: total,
            local_requests: local,
            remote_requests: remote,
            local_errors: self.local_errors.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            specialized_requests: specialized,
            local_share_pct,
            specialization_rate_pct,
            estimated_tokens_served_locally: estimated_tokens,
            estimated_cost_saved_usd,
        }
    }

    /// Administrative clear: zero every counter and restart the window.
    pub fn clear(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.local_requests.store(0, Ordering::Relaxed);
        self.remote_requests.store(0, Ordering::Relaxed);
        self.local_errors.store(0, Ordering::Relaxed);
        self.remote_errors.store(0, Ordering::Relaxed);
        self.fallbacks.store(0, Ordering::Relaxed);
        self.specialized_requests.store(0, Ordering::Relaxed);
        self.chars_served_locally.store(0, Ordering::Relaxed);
        *self.since.lock().unwrap() = Utc::now();
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
