//! Generation endpoint configuration.

use std::time::Duration;

use covboost_core::context::{DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_MODEL_ID};

/// GitHub Models chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://models.inference.ai.azure.com/chat/completions";

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Settings for [`crate::ModelsClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenConfig {
    /// Full chat-completions URL.
    pub endpoint: String,
    pub model: String,
    /// Bearer token; required before any request is sent.
    pub token: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            endpoint: std::env::var("COVBOOST_MODELS_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            model: std::env::var("COVBOOST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }
}

impl GenConfig {
    /// Read `COVBOOST_MODELS_ENDPOINT`, `COVBOOST_MODEL` and `GITHUB_TOKEN`.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific endpoint, ignoring the environment.
    pub fn new(endpoint: &str, model: &str) -> Self {
        GenConfig {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            token: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
