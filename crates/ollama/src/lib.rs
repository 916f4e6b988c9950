//! Minimal Ollama HTTP client: chat completions and embeddings.

mod client;

pub use client::{
    ChatOptions, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, Message, OllamaClient,
    OllamaError, DEFAULT_ENDPOINT,
};
