//! Client configuration and credentials.

use std::fmt;
use std::time::Duration;

use crate::error::{AiError, Result};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Optional model override.
pub const MODEL_VAR: &str = "ANTHROPIC_MODEL";

/// Optional API base URL override.
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";

/// An API key. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key. Blank keys are rejected.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(AiError::MissingCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(API_KEY_VAR).ok())
    }

    pub(crate) fn from_value(value: Option<String>) -> Result<Self> {
        value.map_or(Err(AiError::MissingCredential), Self::new)
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Model parameters and transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Model id
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Reply token limit
    pub max_tokens: u32,
    /// Upper bound for one request; the task deadline may cut it shorter
    pub timeout: Duration,
    /// API root, without the `/v1/messages` path
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            temperature: 0.1,
            max_tokens: 8192,
            timeout: Duration::from_secs(300),
            base_url: "https://api.anthropic.com".to_string(),
        }
    }
}

impl LlmConfig {
    /// Defaults with `ANTHROPIC_MODEL` and `ANTHROPIC_BASE_URL` applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(std::env::var(MODEL_VAR).ok(), std::env::var(BASE_URL_VAR).ok())
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_overrides(mut self, model: Option<String>, base_url: Option<String>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}
