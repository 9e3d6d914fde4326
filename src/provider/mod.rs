//! Outbound provider clients and failure classification.
//!
//! The provider set is closed: `local` speaks a completion-style generate
//! endpoint, `remote` speaks a vendor messages endpoint. Both clients return
//! plain text on success and a classified [`ProviderFailure`] otherwise.

pub mod local;
pub mod remote;

pub use local::LocalClient;
pub use remote::RemoteClient;

use crate::error::ErrorClass;

/// Known credit-exhaustion phrasings, matched case-insensitively against
/// error response bodies. Vendors word this inconsistently.
const CREDIT_PHRASES: &[&str] = &[
    "credit balance",
    "insufficient credits",
    "quota exceeded",
    "payment required",
];

/// A failed provider attempt with its classified cause.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub class: ErrorClass,
    pub message: String,
}

impl ProviderFailure {
    /// Classify a transport-level reqwest error (no HTTP response).
    pub fn from_request_error(err: reqwest::Error) -> Self {
        let class = if err.is_timeout() {
            ErrorClass::Timeout
        } else if err.is_connect() {
            ErrorClass::Transport
        } else if err.is_decode() {
            ErrorClass::Unknown
        } else {
            ErrorClass::Transport
        };
        Self {
            class,
            message: err.to_string(),
        }
    }

    /// Classify a non-success HTTP response from its status and body.
    pub fn from_status(status: u16, body: String) -> Self {
        Self {
            class: classify_http_failure(status, &body),
            message: format!("HTTP {}: {}", status, body),
        }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// Map an HTTP failure to an [`ErrorClass`].
///
/// Credit phrasing takes precedence over the status code: some vendors
/// report exhausted credit behind 400 or 429.
fn classify_http_failure(status: u16, body: &str) -> ErrorClass {
    let lower = body.to_lowercase();
    if status == 402 || CREDIT_PHRASES.iter().any(|p| lower.contains(p)) {
        return ErrorClass::CreditExhausted;
    }
    if status == 429 {
        return ErrorClass::RateLimited;
    }
    ErrorClass::Unknown
}
