//! Configuration parsing and validation for switchyard.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

use crate::types::ProviderId;

/// Convention env var consulted when the remote API key is absent from config.
pub const REMOTE_KEY_ENV_VAR: &str = "SWITCHYARD_REMOTE_API_KEY";

/// Default specialized-task hints that prefer the remote provider.
pub const DEFAULT_SPECIALIZED_TASKS: &[&str] = &[
    "code_review",
    "complex_analysis",
    "creative_writing",
    "technical_documentation",
    "critical_thinking",
    "advanced_reasoning",
];

/// Default trigger phrases that prefer the remote provider.
pub const DEFAULT_TRIGGER_PHRASES: &[&str] = &[
    "analyze deeply",
    "complex analysis",
    "critical thinking",
    "code review",
    "comprehensive analysis",
];

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub local: LocalProviderConfig,
    #[serde(default)]
    pub remote: RemoteProviderConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Routing preferences.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Preferred provider for standard (non-specialized) requests.
    #[serde(default = "default_primary")]
    pub primary: ProviderId,
    /// Whether a failed attempt may fall back to the alternate provider.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    /// Consecutive failures after which a provider counts as unreachable.
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after: u32,
}

fn default_primary() -> ProviderId {
    ProviderId::Local
}

fn default_unreachable_after() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback_enabled: true,
            unreachable_after: default_unreachable_after(),
        }
    }
}

/// Local (self-hosted) provider endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalProviderConfig {
    /// Base URL of the local inference server.
    #[serde(default = "default_local_url")]
    pub url: String,
    /// Default model identifier. May be substituted at start-up if the
    /// capability probe finds it missing.
    #[serde(default = "default_local_model")]
    pub model: String,
    /// Request timeout. Local inference is slower per token but has no
    /// network hop, so this is the longer of the two.
    #[serde(default = "default_local_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_local_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_local_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_local_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            url: default_local_url(),
            model: default_local_model(),
            timeout_secs: default_local_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

/// Remote (metered, vendor-hosted) provider endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProviderConfig {
    #[serde(default = "default_remote_url")]
    pub url: String,
    #[serde(default = "default_remote_model")]
    pub model: String,
    /// Vendor API key. May be a literal or a `${VAR}` reference; absent keys
    /// fall back to the `SWITCHYARD_REMOTE_API_KEY` env var.
    pub api_key: Option<ApiKey>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_remote_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_remote_timeout() -> u64 {
    60
}

impl Default for RemoteProviderConfig {
    fn default() -> Self {
        Self {
            url: default_remote_url(),
            model: default_remote_model(),
            api_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

/// Specialization vocabulary for the request classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Task hints that mark a request as specialized.
    #[serde(default = "default_specialized_tasks")]
    pub specialized_tasks: Vec<String>,
    /// Phrases that mark a request as specialized when present in the text.
    #[serde(default = "default_trigger_phrases")]
    pub trigger_phrases: Vec<String>,
}

fn default_specialized_tasks() -> Vec<String> {
    DEFAULT_SPECIALIZED_TASKS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_trigger_phrases() -> Vec<String> {
    DEFAULT_TRIGGER_PHRASES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            specialized_tasks: default_specialized_tasks(),
            trigger_phrases: default_trigger_phrases(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The inner `SecretString` ensures the key value is:
/// - Zeroized in memory when dropped
/// - Never exposed via Debug or Display
/// - Only accessible via `.expose_secret()` (grep-auditable)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the remote API key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was auto-discovered from the convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set: {message}")]
    EnvVar { var: String, message: String },
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// The closure-based design makes this testable without touching global env
/// state. Supports multiple `${VAR}` in one string. Fails on first missing
/// variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced by remote.api_key)",
                var_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Raw remote config deserialized directly from TOML. `api_key` is a plain
/// `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize, Default)]
struct RawRemoteConfig {
    url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    router: Option<RouterConfig>,
    #[serde(default)]
    local: Option<LocalProviderConfig>,
    #[serde(default)]
    remote: RawRemoteConfig,
    #[serde(default)]
    classifier: Option<ClassifierConfig>,
    #[serde(default)]
    logging: Option<LoggingConfig>,
}

impl Config {
    /// Load configuration from a TOML file without env expansion.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file with env var resolution for the
    /// remote API key:
    /// - `${VAR}` references are expanded from the environment
    /// - a literal value is used as-is
    /// - an absent key falls back to `SWITCHYARD_REMOTE_API_KEY`
    ///
    /// Returns the config and the key's provenance.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<(Self, KeySource), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content)?;
        let (config, source) = Self::from_raw(raw, |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok((config, source))
    }

    fn from_raw<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (api_key, source) = match raw.remote.api_key {
            Some(ref raw_key) if raw_key.contains("${") => {
                let expanded = expand_env_vars_with(raw_key, &lookup)?;
                (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
            }
            Some(ref raw_key) => (Some(ApiKey::from(raw_key.as_str())), KeySource::Literal),
            None => match lookup(REMOTE_KEY_ENV_VAR) {
                Some(value) => (
                    Some(ApiKey::from(value)),
                    KeySource::Convention(REMOTE_KEY_ENV_VAR.to_string()),
                ),
                None => (None, KeySource::None),
            },
        };

        let remote_defaults = RemoteProviderConfig::default();
        let config = Config {
            router: raw.router.unwrap_or_default(),
            local: raw.local.unwrap_or_default(),
            remote: RemoteProviderConfig {
                url: raw.remote.url.unwrap_or(remote_defaults.url),
                model: raw.remote.model.unwrap_or(remote_defaults.model),
                api_key,
                timeout_secs: raw
                    .remote
                    .timeout_secs
                    .unwrap_or(remote_defaults.timeout_secs),
            },
            classifier: raw.classifier.unwrap_or_default(),
            logging: raw.logging.unwrap_or_default(),
        };

        Ok((config, source))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local.url.is_empty() {
            return Err(ConfigError::Validation(
                "local provider has empty URL".to_string(),
            ));
        }
        if self.remote.url.is_empty() {
            return Err(ConfigError::Validation(
                "remote provider has empty URL".to_string(),
            ));
        }
        if self.router.unreachable_after == 0 {
            return Err(ConfigError::Validation(
                "router.unreachable_after must be at least 1".to_string(),
            ));
        }
        if self.local.timeout_secs == 0 || self.remote.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "provider timeouts must be non-zero".to_string(),
            ));
        }
        if self.remote.api_key.is_none() {
            tracing::warn!(
                "no remote API key configured - remote requests will be unauthenticated"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.router.primary, ProviderId::Local);
        assert!(config.router.fallback_enabled);
        assert_eq!(config.router.unreachable_after, 1);
        assert_eq!(config.local.url, "http://127.0.0.1:11434");
        assert_eq!(config.remote.timeout_secs, 60);
        assert!(config
            .classifier
            .specialized_tasks
            .iter()
            .any(|t| t == "code_review"));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [router]
            primary = "remote"
            fallback_enabled = false
            unreachable_after = 3

            [local]
            url = "http://10.0.0.5:11434"
            model = "qwen2.5:14b"
            timeout_secs = 180

            [remote]
            url = "https://api.example.com"
            model = "claude-3-5-haiku-20241022"
            api_key = "sk-test"
            timeout_secs = 30

            [classifier]
            specialized_tasks = ["code_review"]
            trigger_phrases = ["think hard"]

            [logging]
            level = "debug"
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.router.primary, ProviderId::Remote);
        assert!(!config.router.fallback_enabled);
        assert_eq!(config.router.unreachable_after, 3);
        assert_eq!(config.local.model, "qwen2.5:14b");
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.classifier.specialized_tasks, vec!["code_review"]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn validation_rejects_zero_threshold() {
        let result = Config::parse_str("[router]\nunreachable_after = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_empty_url() {
        let result = Config::parse_str("[local]\nurl = \"\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn expand_multiple_vars() {
        let expanded = expand_env_vars_with("${SCHEME}://${HOST}", |name| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("api.test".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(expanded, "https://api.test");
    }

    #[test]
    fn expand_missing_var_fails() {
        let result = expand_env_vars_with("${MISSING}", |_| None);
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));
    }

    #[test]
    fn expand_unclosed_reference_fails() {
        let result = expand_env_vars_with("${OPEN", |_| Some("x".to_string()));
        assert!(matches!(result, Err(ConfigError::EnvVar { .. })));
    }

    #[test]
    fn from_raw_expands_key_reference() {
        let raw: RawConfig = toml::from_str("[remote]\napi_key = \"${MY_KEY}\"\n").unwrap();
        let (config, source) = Config::from_raw(raw, |name| {
            (name == "MY_KEY").then(|| "sk-expanded".to_string())
        })
        .unwrap();
        assert_eq!(source, KeySource::EnvExpanded);
        assert_eq!(
            config.remote.api_key.unwrap().expose_secret(),
            "sk-expanded"
        );
    }

    #[test]
    fn from_raw_uses_convention_var_when_absent() {
        let raw: RawConfig = toml::from_str("").unwrap();
        let (config, source) = Config::from_raw(raw, |name| {
            (name == REMOTE_KEY_ENV_VAR).then(|| "sk-convention".to_string())
        })
        .unwrap();
        assert_eq!(
            source,
            KeySource::Convention(REMOTE_KEY_ENV_VAR.to_string())
        );
        assert_eq!(
            config.remote.api_key.unwrap().expose_secret(),
            "sk-convention"
        );
    }

    #[test]
    fn api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-value");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn remote_config_debug_redaction() {
        let config = RemoteProviderConfig {
            api_key: Some(ApiKey::from("sk-live-abcd1234")),
            ..RemoteProviderConfig::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-live-abcd1234"));
    }
}
