//! Request and response types for the router's inbound contract.

use serde::{Deserialize, Serialize};

use crate::error::ErrorClass;

/// Identity of a backing provider. The set is intentionally closed: `local`
/// is self-hosted with zero marginal cost, `remote` is metered and assumed
/// higher quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Local,
    Remote,
}

impl ProviderId {
    /// Lowercase string representation for logs and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Local => "local",
            ProviderId::Remote => "remote",
        }
    }

    /// The alternate provider, used for the single fallback attempt.
    pub fn other(&self) -> ProviderId {
        match self {
            ProviderId::Local => ProviderId::Remote,
            ProviderId::Remote => ProviderId::Local,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role/content turn.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Caller-supplied request. Immutable for the lifetime of one
/// routing+execution cycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestContext {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_hint: Option<String>,
    #[serde(default)]
    pub force_remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl RequestContext {
    /// Build a single-turn user request.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            task_hint: None,
            force_remote: false,
            max_tokens: None,
        }
    }

    /// All message content concatenated, for classification heuristics.
    pub fn joined_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Total content length in characters, for cost estimation.
    pub fn char_count(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }

    /// Flatten the structured turns into a single prompt for the local
    /// provider's completion-style endpoint. The remote provider takes the
    /// structured messages unchanged.
    pub fn flattened_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| match m.role.as_str() {
                "user" => m.content.clone(),
                role => format!("[{}] {}", role, m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result of one provider execution attempt. A request produces at most two.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub provider: ProviderId,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
}

/// Successful router response returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RouterResponse {
    pub text: String,
    /// The provider that produced the text.
    pub provider: ProviderId,
    /// Routing reason tag, e.g. `specialized_task:code_review`.
    pub routing_reason: String,
    pub fallback_used: bool,
    /// Set when `fallback_used`: the provider the request was routed to first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_provider: Option<ProviderId>,
    /// Wall-clock latency for the whole routing+execution cycle.
    pub latency_ms: u64,
}
