//! Error types for switchyard.

use serde::Serialize;

use crate::types::ProviderId;

/// Result type alias for switchyard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed provider attempt.
///
/// `CreditExhausted` is the only class with routing memory: on the remote
/// provider it sets a sticky flag that survives later successes and is
/// cleared only by an explicit administrative reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    Transport,
    RateLimited,
    CreditExhausted,
    Unknown,
}

impl ErrorClass {
    /// Lowercase string representation for logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::Transport => "transport",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::CreditExhausted => "credit_exhausted",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for switchyard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A single provider attempt failed and no fallback was permitted.
    #[error("Provider '{provider}' failed ({class}): {message}")]
    Provider {
        provider: ProviderId,
        class: ErrorClass,
        message: String,
    },

    /// Both the routed provider and the fallback failed. Carries both
    /// underlying messages verbatim so callers see both causes.
    #[error("Both providers failed. {primary_provider}: {primary_message}; {fallback_provider}: {fallback_message}")]
    BothProvidersFailed {
        primary_provider: ProviderId,
        primary_class: ErrorClass,
        primary_message: String,
        fallback_provider: ProviderId,
        fallback_class: ErrorClass,
        fallback_message: String,
    },
}
