//! OpenAI-compatible chat-completions client.

use std::time::Instant;

use async_trait::async_trait;
use covboost_core::{GenerationRequest, TestGenerator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GenConfig;
use crate::error::{GenError, Result};
use crate::prompt::build_messages;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseChoice {
    pub message: ChatResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    /// Content of the first choice, if non-empty.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Client for a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ModelsClient {
    config: GenConfig,
    client: reqwest::Client,
}

impl ModelsClient {
    pub fn new(config: GenConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GenConfig::from_env())
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// Send `messages` and return the first choice's content.
    pub async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let token = self.config.token.as_deref().ok_or(GenError::MissingToken)?;
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let start = Instant::now();
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let response: ChatResponse = serde_json::from_str(&body)?;
        debug!(
            model = ?response.model,
            finish_reason = ?response.choices.first().and_then(|c| c.finish_reason.clone()),
            latency_ms = start.elapsed().as_millis() as u64,
            "chat completion received"
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or(GenError::EmptyResponse)
    }
}

#[async_trait]
impl TestGenerator for ModelsClient {
    async fn generate(&self, request: &GenerationRequest) -> covboost_core::Result<String> {
        info!(
            model = %self.config.model,
            target = %request.target_path.display(),
            "Calling generation endpoint"
        );
        Ok(self.chat_completion(build_messages(request)).await?)
    }
}
