// Remote capabilities the pipeline depends on

use super::types::TranslationRequest;
use async_trait::async_trait;

/// What the generator is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub count: usize,
    pub topic: Option<String>,
    pub max_words_per_sentence: usize,
    pub language: String,
}

/// Produces source-language sentences under a behavioural profile. Returns
/// the raw response text; shape validation is the caller's job.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    async fn generate(&self, profile: &str, request: &GenerationRequest) -> Result<String, CapabilityError>;
}

/// Translates one sentence under a behavioural profile. Returns the raw
/// structured payload, possibly wrapped in a code fence.
#[async_trait]
pub trait TranslationCapability: Send + Sync {
    async fn translate(&self, profile: &str, request: &TranslationRequest) -> Result<String, CapabilityError>;
}

/// Turns texts into vectors, same length and order as the input
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Response(String),
}

impl CapabilityError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CapabilityError::Network(_) | CapabilityError::Timeout => true,
            CapabilityError::Service { status, .. } => *status == 429 || *status >= 500,
            CapabilityError::Response(_) => false,
        }
    }
}

impl From<ollama::OllamaError> for CapabilityError {
    fn from(err: ollama::OllamaError) -> Self {
        match err {
            ollama::OllamaError::Network(msg) => CapabilityError::Network(msg),
            ollama::OllamaError::Timeout => CapabilityError::Timeout,
            ollama::OllamaError::Status { status, body } => CapabilityError::Service { status, message: body },
            ollama::OllamaError::Decode(msg) => CapabilityError::Response(msg),
        }
    }
}
