// Translation agents

mod translator;

pub use translator::{RetryPolicy, TranslationAgent};

use super::capability::TranslationCapability;
use super::config::{ConfigError, PipelineConfig};
use std::sync::Arc;

/// One agent per configured hop, in loop order, all sharing `capability`
pub fn build_agents(
    config: &PipelineConfig,
    capability: Arc<dyn TranslationCapability>,
) -> Result<Vec<TranslationAgent>, ConfigError> {
    config
        .hops
        .iter()
        .map(|hop| TranslationAgent::from_config(hop, config, capability.clone()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{agent_id} interrupted after {completed} of {total} sentences")]
    Interrupted {
        agent_id: String,
        completed: usize,
        total: usize,
    },
}
