// Round-trip translation pipeline
//
// Generates source-language sentences, sends them around a closed loop of
// translation agents and measures how far the result drifted from the input.

pub mod agents;
pub mod backend;
pub mod capability;
pub mod config;
pub mod interrupt;
pub mod orchestrator;
pub mod protocol;
pub mod report;
pub mod scorer;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod fakes;

pub use agents::{AgentError, RetryPolicy, TranslationAgent, build_agents};
pub use backend::OllamaBackend;
pub use capability::{CapabilityError, Embedder, GenerationCapability, GenerationRequest, TranslationCapability};
pub use config::{CONFIG_FILE_NAME, ConfigError, HopConfig, PipelineConfig};
pub use interrupt::Interrupt;
pub use orchestrator::{EmbedderFactory, Orchestrator, PipelineError, RunOutcome, RunRequest, RunStage};
pub use scorer::{QualityScorer, ScoreError, cosine_distance};
pub use store::StoreError;
pub use types::{
    HopOutput, HopStats, LengthMismatch, PipelineRun, QualityReport, TranslationRequest, TranslationResult,
};
