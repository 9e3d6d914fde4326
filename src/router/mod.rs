//! Request classification and provider selection.
//!
//! The classifier decides whether a request needs the higher-capability
//! remote provider; the engine combines that with provider health to pick
//! exactly one provider per request.

mod classifier;
mod engine;

pub use classifier::{Classification, Classifier};
pub use engine::{RoutingDecision, RoutingEngine};

/// Fixed vocabulary of routing reason tags.
///
/// The string forms are part of the caller-visible contract and show up in
/// responses, logs, and statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteReason {
    /// Task hint matched the specialized-task set.
    SpecializedTask(String),
    /// Caller forced the remote provider.
    ForceOverride,
    /// A trigger phrase was present in the text.
    KeywordTrigger(String),
    /// Heuristic complexity score above threshold.
    HighComplexity(f64),
    /// Programming-related text.
    CodeRelated,
    /// No specialization signal.
    StandardRequest,
    /// The configured primary provider was chosen.
    PrimaryProvider,
    /// The primary was unavailable; the alternate was reachable.
    FallbackAvailable,
    /// A specialized request had to settle for the local provider.
    ProviderUnavailableFallback,
    /// Neither provider was reachable; the decision still names one.
    LastResort,
}

impl RouteReason {
    /// Whether this reason counts toward the specialization statistics.
    /// Force overrides and code-heuristic hits deliberately do not.
    pub fn is_specialization(&self) -> bool {
        matches!(
            self,
            RouteReason::SpecializedTask(_)
                | RouteReason::KeywordTrigger(_)
                | RouteReason::HighComplexity(_)
        )
    }
}

impl std::fmt::Display for RouteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteReason::SpecializedTask(hint) => write!(f, "specialized_task:{}", hint),
            RouteReason::ForceOverride => write!(f, "force_override"),
            RouteReason::KeywordTrigger(phrase) => write!(f, "keyword_trigger:{}", phrase),
            RouteReason::HighComplexity(score) => write!(f, "high_complexity:{:.2}", score),
            RouteReason::CodeRelated => write!(f, "code_related_request"),
            RouteReason::StandardRequest => write!(f, "standard_request"),
            RouteReason::PrimaryProvider => write!(f, "primary_provider"),
            RouteReason::FallbackAvailable => write!(f, "fallback_available"),
            RouteReason::ProviderUnavailableFallback => {
                write!(f, "provider_unavailable_fallback")
            }
            RouteReason::LastResort => write!(f, "last_resort"),
        }
    }
}
