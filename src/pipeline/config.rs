// Pipeline configuration: defaults, config file discovery, env overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".roundtrip.json";

/// Profile name of the sentence generator, i.e. `<prompts_dir>/generator.md`
pub const GENERATOR_PROFILE: &str = "generator";

/// Everything a run needs, built once at startup and passed by reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_endpoint")]
    pub ollama_endpoint: String,

    /// Chat model used for generation and translation
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding `<agent_id>.md` behavioural profiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,

    #[serde(default = "default_source_language")]
    pub source_language: String,

    #[serde(default = "default_hops")]
    pub hops: Vec<HopConfig>,

    #[serde(default = "default_min_sentences")]
    pub min_sentences: usize,

    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,

    #[serde(default = "default_max_sentence_words")]
    pub max_sentence_words: usize,

    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    #[serde(default = "default_translation_temperature")]
    pub translation_temperature: f32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_low_confidence")]
    pub low_confidence_threshold: f64,

    #[serde(default = "default_original_artifact")]
    pub original_artifact: String,

    #[serde(default = "default_metrics_artifact")]
    pub metrics_artifact: String,

    #[serde(default = "default_chart_artifact")]
    pub chart_artifact: String,

    /// Prefix each persisted sentence with `[n] `
    #[serde(default = "default_numbered")]
    pub numbered_artifacts: bool,

    #[serde(default = "default_journey_preview")]
    pub journey_preview: usize,

    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

/// One directed hop of the loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopConfig {
    pub agent_id: String,
    pub source_language: String,
    pub target_language: String,
    /// File name of this hop's sentence artifact
    pub artifact: String,
}

impl HopConfig {
    pub fn new(
        agent_id: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            artifact: artifact.into(),
        }
    }
}

fn default_endpoint() -> String {
    ollama::DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    "gpt-oss:20b".to_string()
}

fn default_embedding_model() -> String {
    "paraphrase-multilingual".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_source_language() -> String {
    "he".to_string()
}

fn default_hops() -> Vec<HopConfig> {
    vec![
        HopConfig::new("agent1_hebrew_to_english", "he", "en", "sentences_english.txt"),
        HopConfig::new("agent2_english_to_french", "en", "fr", "sentences_french.txt"),
        HopConfig::new("agent3_french_to_hebrew", "fr", "he", "sentences_hebrew_final.txt"),
    ]
}

fn default_min_sentences() -> usize {
    10
}

fn default_max_sentences() -> usize {
    100
}

fn default_max_sentence_words() -> usize {
    30
}

fn default_generation_temperature() -> f32 {
    0.7
}

fn default_translation_temperature() -> f32 {
    0.3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_low_confidence() -> f64 {
    0.7
}

fn default_original_artifact() -> String {
    "sentences_hebrew_original.txt".to_string()
}

fn default_metrics_artifact() -> String {
    "quality_metrics.json".to_string()
}

fn default_chart_artifact() -> String {
    "translation_quality_graph.png".to_string()
}

fn default_numbered() -> bool {
    true
}

fn default_journey_preview() -> usize {
    5
}

fn default_chart_width() -> u32 {
    1200
}

fn default_chart_height() -> u32 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: default_endpoint(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            output_dir: default_output_dir(),
            prompts_dir: None,
            source_language: default_source_language(),
            hops: default_hops(),
            min_sentences: default_min_sentences(),
            max_sentences: default_max_sentences(),
            max_sentence_words: default_max_sentence_words(),
            generation_temperature: default_generation_temperature(),
            translation_temperature: default_translation_temperature(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            low_confidence_threshold: default_low_confidence(),
            original_artifact: default_original_artifact(),
            metrics_artifact: default_metrics_artifact(),
            chart_artifact: default_chart_artifact(),
            numbered_artifacts: default_numbered(),
            journey_preview: default_journey_preview(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl PipelineConfig {
    /// Load from `explicit`, or from the first `.roundtrip.json` found in the
    /// current directory or home directory, or fall back to defaults.
    ///
    /// Returns the path the config was read from, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config(),
        };

        let config = match &path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        Ok((config, path))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Write this config as pretty JSON, e.g. for `--init-config`
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
    }

    /// Apply `OLLAMA_HOST`, `OLLAMA_MODEL`, `OLLAMA_EMBED_MODEL` and
    /// `ROUNDTRIP_OUTPUT_DIR` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama_endpoint = if host.starts_with("http://") || host.starts_with("https://") {
                host
            } else {
                format!("http://{}", host)
            };
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.model = model;
        }
        if let Some(model) = lookup("OLLAMA_EMBED_MODEL") {
            self.embedding_model = model;
        }
        if let Some(dir) = lookup("ROUNDTRIP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Check internal consistency. Reports every problem, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.min_sentences < 1 {
            problems.push("min_sentences must be at least 1".to_string());
        }
        if self.min_sentences > self.max_sentences {
            problems.push(format!(
                "min_sentences ({}) must not exceed max_sentences ({})",
                self.min_sentences, self.max_sentences
            ));
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            problems.push(format!(
                "low_confidence_threshold must be within [0, 1], got {}",
                self.low_confidence_threshold
            ));
        }
        if self.max_sentence_words == 0 {
            problems.push("max_sentence_words must be positive".to_string());
        }

        if self.hops.is_empty() {
            problems.push("at least one hop is required".to_string());
        } else {
            let mut expected_source = self.source_language.as_str();
            for (index, hop) in self.hops.iter().enumerate() {
                if hop.source_language != expected_source {
                    problems.push(format!(
                        "hop {} ({}) starts from '{}' but the previous stage produces '{}'",
                        index + 1,
                        hop.agent_id,
                        hop.source_language,
                        expected_source
                    ));
                }
                if hop.source_language == hop.target_language {
                    problems.push(format!(
                        "hop {} ({}) translates '{}' into itself",
                        index + 1,
                        hop.agent_id,
                        hop.source_language
                    ));
                }
                if hop.artifact.trim().is_empty() {
                    problems.push(format!("hop {} ({}) has no artifact name", index + 1, hop.agent_id));
                }
                expected_source = hop.target_language.as_str();
            }
            if expected_source != self.source_language {
                problems.push(format!(
                    "the last hop ends in '{}', not the source language '{}'",
                    expected_source, self.source_language
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Check a requested sentence count against the configured bounds
    pub fn validate_sentence_count(&self, count: usize) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if count < self.min_sentences {
            problems.push(format!("Number of sentences must be at least {}", self.min_sentences));
        }
        if count > self.max_sentences {
            problems.push(format!("Number of sentences must not exceed {}", self.max_sentences));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::SentenceCount(problems))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn original_path(&self) -> PathBuf {
        self.artifact_path(&self.original_artifact)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.artifact_path(&self.metrics_artifact)
    }

    pub fn chart_path(&self) -> PathBuf {
        self.artifact_path(&self.chart_artifact)
    }
}

/// `<prompts_dir>/<name>.md`, if a prompts directory is set and the file exists.
/// A file that exists but cannot be read is an error.
pub fn read_profile(prompts_dir: Option<&Path>, name: &str) -> Result<Option<String>, ConfigError> {
    let Some(dir) = prompts_dir else {
        return Ok(None);
    };
    let path = dir.join(format!("{}.md", name));
    if !path.exists() {
        return Ok(None);
    }

    let profile = std::fs::read_to_string(&path).map_err(|e| ConfigError::Profile {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    tracing::debug!(profile = name, path = %path.display(), "loaded behavioural profile");
    Ok(Some(profile))
}

fn find_config() -> Option<PathBuf> {
    // Try current directory first
    let local_config = PathBuf::from(CONFIG_FILE_NAME);
    if local_config.exists() {
        return Some(local_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(CONFIG_FILE_NAME);
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(String),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Invalid sentence count: {}", .0.join("; "))]
    SentenceCount(Vec<String>),

    #[error("Cannot read behavioural profile {path}: {reason}")]
    Profile { path: PathBuf, reason: String },
}

impl ConfigError {
    /// Individual violations, for listing one per line
    pub fn violations(&self) -> Vec<String> {
        match self {
            ConfigError::Invalid(problems) | ConfigError::SentenceCount(problems) => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}
