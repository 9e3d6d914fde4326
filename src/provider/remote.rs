//! Remote provider client: a metered vendor messages endpoint with API-key
//! authentication. Structured role/content turns pass through unchanged.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ProviderFailure;
use crate::config::{ApiKey, RemoteProviderConfig};
use crate::error::ErrorClass;
use crate::types::ChatMessage;

/// Vendor API version header value.
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// HTTP client for the remote provider.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<ApiKey>,
}

impl RemoteClient {
    pub fn new(config: &RemoteProviderConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Run one completion against the vendor messages endpoint.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, ProviderFailure> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages,
        };

        let mut request = self
            .http
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(ProviderFailure::from_request_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(ProviderFailure::from_request_error)?;

        if !status.is_success() {
            return Err(ProviderFailure::from_status(status.as_u16(), text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text).map_err(|e| ProviderFailure {
            class: ErrorClass::Unknown,
            message: format!("invalid messages response: {}", e),
        })?;

        let combined = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(combined)
    }

    /// Minimal connectivity probe: a one-token message. This is the only
    /// probe that exercises auth and billing end to end.
    pub async fn probe(&self) -> Result<(), ProviderFailure> {
        self.complete(&[ChatMessage::user("ping")], 1).await.map(|_| ())
    }
}
