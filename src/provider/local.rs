//! Local provider client: a self-hosted inference server with a
//! completion-style generate endpoint and a model-listing capability query.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ProviderFailure;
use crate::config::LocalProviderConfig;
use crate::error::ErrorClass;

/// Generate request body. The structured turns have already been flattened
/// into a single prompt by this point.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP client for the local provider.
#[derive(Debug, Clone)]
pub struct LocalClient {
    http: Client,
    base_url: String,
    temperature: f32,
    top_p: f32,
}

impl LocalClient {
    pub fn new(config: &LocalProviderConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    /// Run one completion. The model is passed per call because the start-up
    /// probe may have substituted the configured default.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, ProviderFailure> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                max_tokens,
                top_p: self.top_p,
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
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

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| ProviderFailure {
            class: ErrorClass::Unknown,
            message: format!("invalid generate response: {}", e),
        })?;

        Ok(parsed.response)
    }

    /// Capability query: list installed models. Used by the start-up probe
    /// and the connectivity test.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderFailure> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .http
            .get(&url)
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

        let parsed: TagsResponse = serde_json::from_str(&text).map_err(|e| ProviderFailure {
            class: ErrorClass::Unknown,
            message: format!("invalid tags response: {}", e),
        })?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}
