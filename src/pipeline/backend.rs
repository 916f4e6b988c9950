// Ollama-backed capabilities

use super::capability::{CapabilityError, Embedder, GenerationCapability, GenerationRequest, TranslationCapability};
use super::config::PipelineConfig;
use super::protocol;
use super::types::TranslationRequest;
use async_trait::async_trait;
use ollama::{ChatRequest, OllamaClient};

/// Generation, translation and embedding against one Ollama server
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: OllamaClient,
    model: String,
    embedding_model: String,
    generation_temperature: f32,
    translation_temperature: f32,
}

impl OllamaBackend {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, CapabilityError> {
        let client = OllamaClient::new(&config.ollama_endpoint, config.request_timeout())?;
        Ok(Self {
            client,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            generation_temperature: config.generation_temperature,
            translation_temperature: config.translation_temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.client.base_url()
    }

    fn generation_request(&self, profile: &str, request: &GenerationRequest) -> ChatRequest {
        // No JSON mode here: Ollama's JSON format wants an object, we want a bare array
        ChatRequest::new(&self.model, profile, protocol::render_generation_prompt(request))
            .with_temperature(self.generation_temperature)
    }

    fn translation_request(&self, profile: &str, request: &TranslationRequest) -> ChatRequest {
        ChatRequest::new(&self.model, profile, protocol::render_translation_prompt(request))
            .json()
            .with_temperature(self.translation_temperature)
    }
}

#[async_trait]
impl GenerationCapability for OllamaBackend {
    async fn generate(&self, profile: &str, request: &GenerationRequest) -> Result<String, CapabilityError> {
        tracing::debug!(model = %self.model, count = request.count, "requesting sentences");
        Ok(self.client.chat(&self.generation_request(profile, request)).await?)
    }
}

#[async_trait]
impl TranslationCapability for OllamaBackend {
    async fn translate(&self, profile: &str, request: &TranslationRequest) -> Result<String, CapabilityError> {
        Ok(self.client.chat(&self.translation_request(profile, request)).await?)
    }
}

#[async_trait]
impl Embedder for OllamaBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        tracing::debug!(model = %self.embedding_model, count = texts.len(), "requesting embeddings");
        Ok(self.client.embed(&self.embedding_model, texts).await?)
    }
}
