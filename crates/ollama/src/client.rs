//! Ollama API client

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OllamaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OllamaError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Non-streaming chat completion. Returns the assistant message content.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::trace!(%url, model = %request.model, "ollama chat request");

        let response: ChatResponse = self.post_json(&url, request).await?;
        Ok(response.message.content)
    }

    /// Embed a batch of texts. The returned vectors follow input order.
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>, OllamaError> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: model.to_string(),
            input: input.to_vec(),
        };
        tracing::trace!(%url, model, count = input.len(), "ollama embed request");

        let response: EmbedResponse = self.post_json(&url, &request).await?;
        if response.embeddings.len() != input.len() {
            return Err(OllamaError::Decode(format!(
                "expected {} embeddings, got {}",
                input.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    async fn post_json<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp, OllamaError>
    where
        Req: Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(OllamaError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| OllamaError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

impl ChatRequest {
    /// System + user exchange, non-streaming
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
            stream: false,
            format: None,
            options: None,
        }
    }

    /// Ask the server to constrain output to JSON
    pub fn json(mut self) -> Self {
        self.format = Some("json".to_string());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = Some(ChatOptions { temperature });
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    pub temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Ollama returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl OllamaError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OllamaError::Timeout
        } else {
            OllamaError::Network(err.to_string())
        }
    }
}
