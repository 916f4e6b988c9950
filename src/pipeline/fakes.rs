//! In-memory capabilities for tests
//!
//! Scripted generation, translation and embedding with call recording, so the
//! pipeline can run end to end without a model server.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::capability::{CapabilityError, Embedder, GenerationCapability, GenerationRequest, TranslationCapability};
use super::types::TranslationRequest;

/// Render a well-formed translation payload for `request`
pub fn payload(request: &TranslationRequest, translation: &str, confidence: f64) -> String {
    serde_json::json!({
        "sentence_id": request.sequence_id,
        "translation": translation,
        "confidence": confidence,
        "agent_id": "fake",
        "notes": "",
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Returns the same raw response for every call and records the profiles used
pub struct ScriptedGenerator {
    response: Result<String, CapabilityError>,
    calls: AtomicUsize,
    profiles: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            calls: AtomicUsize::new(0),
            profiles: Mutex::new(Vec::new()),
        }
    }

    pub fn sentences(sentences: &[&str]) -> Self {
        Self::new(serde_json::to_string(sentences).unwrap())
    }

    pub fn failing(err: CapabilityError) -> Self {
        Self {
            response: Err(err),
            calls: AtomicUsize::new(0),
            profiles: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn profiles(&self) -> Vec<String> {
        self.profiles.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationCapability for ScriptedGenerator {
    async fn generate(&self, profile: &str, _request: &GenerationRequest) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profiles.lock().unwrap().push(profile.to_string());
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedTranslator
// ---------------------------------------------------------------------------

type Script = Box<dyn Fn(&TranslationRequest) -> Result<String, CapabilityError> + Send + Sync>;

/// Answers every request through a closure and records what it was asked
pub struct ScriptedTranslator {
    script: Script,
    requests: Mutex<Vec<TranslationRequest>>,
}

impl ScriptedTranslator {
    pub fn new(script: impl Fn(&TranslationRequest) -> Result<String, CapabilityError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns the input text unchanged with high confidence
    pub fn identity() -> Self {
        Self::new(|request| Ok(payload(request, &request.text, 0.95)))
    }

    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationCapability for ScriptedTranslator {
    async fn translate(&self, _profile: &str, request: &TranslationRequest) -> Result<String, CapabilityError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(request)
    }
}

// ---------------------------------------------------------------------------
// TableEmbedder
// ---------------------------------------------------------------------------

/// Looks vectors up by text; unknown texts get a deterministic fallback
#[derive(Default)]
pub struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl TableEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    fn fallback(text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        let sum: u32 = bytes.iter().map(|b| *b as u32).sum();
        vec![1.0 + bytes.len() as f32, (sum % 97) as f32, text.split_whitespace().count() as f32]
    }
}

#[async_trait]
impl Embedder for TableEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        self.batches.lock().unwrap().push(texts.to_vec());
        Ok(texts
            .iter()
            .map(|text| self.table.get(text).cloned().unwrap_or_else(|| Self::fallback(text)))
            .collect())
    }
}
