pub mod pipeline;

pub use pipeline::{Orchestrator, PipelineConfig, PipelineError, RunRequest};
