//! Routing engine: classification + health snapshots -> one decision.
//!
//! `route` is total: for any combination of health states it returns exactly
//! one decision and never panics. Routing never refuses -- when nothing is
//! reachable it still names the local provider and lets execution surface
//! the failure.

use super::{Classification, RouteReason};
use crate::health::ProviderSnapshot;
use crate::types::ProviderId;

/// Immutable routing decision, created fresh per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub provider: ProviderId,
    pub reason: RouteReason,
}

/// Picks a provider from classification and current health.
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    primary: ProviderId,
}

impl RoutingEngine {
    pub fn new(primary: ProviderId) -> Self {
        Self { primary }
    }

    /// Decide which provider should serve this request.
    ///
    /// Specialization is a preference, not a hard requirement: a specialized
    /// request with an unusable remote still gets an answer from local. A
    /// credit-exhausted remote is never selected, for any classification,
    /// until the flag is explicitly reset.
    pub fn route(
        &self,
        classification: &Classification,
        local: &ProviderSnapshot,
        remote: &ProviderSnapshot,
    ) -> RoutingDecision {
        let local_usable = local.reachable;
        let remote_usable = remote.reachable && !remote.credit_exhausted;

        if classification.specialized {
            if remote_usable {
                return RoutingDecision {
                    provider: ProviderId::Remote,
                    reason: classification.reason.clone(),
                };
            }
            tracing::debug!(
                reason = %classification.reason,
                remote_reachable = remote.reachable,
                credit_exhausted = remote.credit_exhausted,
                "specialized request settling for local provider",
            );
            return RoutingDecision {
                provider: ProviderId::Local,
                reason: RouteReason::ProviderUnavailableFallback,
            };
        }

        // Standard request: primary preference first, then whichever side is
        // usable (local preferred on tie), then last resort.
        if self.primary == ProviderId::Local && local_usable {
            return RoutingDecision {
                provider: ProviderId::Local,
                reason: RouteReason::PrimaryProvider,
            };
        }

        if local_usable {
            return RoutingDecision {
                provider: ProviderId::Local,
                reason: self.reason_for(ProviderId::Local),
            };
        }
        if remote_usable {
            return RoutingDecision {
                provider: ProviderId::Remote,
                reason: self.reason_for(ProviderId::Remote),
            };
        }

        RoutingDecision {
            provider: ProviderId::Local,
            reason: RouteReason::LastResort,
        }
    }

    fn reason_for(&self, chosen: ProviderId) -> RouteReason {
        if chosen == self.primary {
            RouteReason::PrimaryProvider
        } else {
            RouteReason::FallbackAvailable
        }
    }
}
