// Core types for the round-trip pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One translation call, as sent to a translation capability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationRequest {
    #[serde(rename = "sentence_id", alias = "sequence_id")]
    pub sequence_id: u32,
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub timestamp: String,
}

impl TranslationRequest {
    pub fn new(
        sequence_id: u32,
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Outcome of a single translation call
///
/// A failed call is still a `TranslationResult`: empty translation, zero
/// confidence and a diagnostic in `notes`. See [`TranslationResult::failure`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationResult {
    #[serde(rename = "sentence_id", alias = "sequence_id")]
    pub sequence_id: u32,
    pub translation: String,
    pub confidence: f64,
    pub agent_id: String,
    pub notes: String,
}

impl TranslationResult {
    /// The canonical failure result
    pub fn failure(sequence_id: u32, agent_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            sequence_id,
            translation: String::new(),
            confidence: 0.0,
            agent_id: agent_id.into(),
            notes: format!("ERROR: {}", reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.confidence == 0.0 && !self.notes.is_empty()
    }
}

/// Per-hop tally of how the batch went
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HopStats {
    pub succeeded: usize,
    pub low_confidence: usize,
    pub failed: usize,
}

impl HopStats {
    pub fn from_results(results: &[TranslationResult], threshold: f64) -> Self {
        let mut stats = HopStats::default();
        for result in results {
            if result.is_failure() {
                stats.failed += 1;
            } else {
                stats.succeeded += 1;
                if result.confidence < threshold {
                    stats.low_confidence += 1;
                }
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Output of one hop of the loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopOutput {
    pub agent_id: String,
    pub language: String,
    pub sentences: Vec<String>,
    pub stats: HopStats,
}

/// The original sentences plus every hop's output, index-aligned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub source_language: String,
    pub original: Vec<String>,
    pub hops: Vec<HopOutput>,
}

impl PipelineRun {
    pub fn new(source_language: impl Into<String>, original: Vec<String>) -> Self {
        Self {
            source_language: source_language.into(),
            original,
            hops: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Input for the next hop: the last hop's output, or the original list
    pub fn latest(&self) -> &[String] {
        self.hops
            .last()
            .map(|hop| hop.sentences.as_slice())
            .unwrap_or(&self.original)
    }

    /// The sentences after the full loop
    pub fn final_sentences(&self) -> &[String] {
        self.latest()
    }

    /// Every list in order: original first, then each hop
    pub fn lists(&self) -> Vec<&[String]> {
        std::iter::once(self.original.as_slice())
            .chain(self.hops.iter().map(|hop| hop.sentences.as_slice()))
            .collect()
    }

    /// Checks that every list has the original's length
    pub fn check_aligned(&self) -> Result<(), LengthMismatch> {
        let expected = self.original.len();
        for (index, hop) in self.hops.iter().enumerate() {
            if hop.sentences.len() != expected {
                return Err(LengthMismatch {
                    what: format!("hop {} ({})", index + 1, hop.agent_id),
                    expected,
                    actual: hop.sentences.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{what} has {actual} sentences, expected {expected}")]
pub struct LengthMismatch {
    pub what: String,
    pub expected: usize,
    pub actual: usize,
}

/// Aggregate drift statistics for one run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityReport {
    pub num_sentences: usize,
    pub mean_distance: f64,
    pub std_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub median_distance: f64,
    pub distances: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}
