// Quality scorer - cosine drift between original and round-tripped sentences

use super::capability::{CapabilityError, Embedder};
use super::types::QualityReport;
use chrono::Utc;
use std::sync::Arc;

/// Scores a run by embedding both sentence lists and comparing pairwise
pub struct QualityScorer {
    embedder: Arc<dyn Embedder>,
}

impl QualityScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Distances and statistics for equal-length `original` / `final_sentences`
    pub async fn score(&self, original: &[String], final_sentences: &[String]) -> Result<QualityReport, ScoreError> {
        if original.len() != final_sentences.len() {
            return Err(ScoreError::LengthMismatch {
                original: original.len(),
                final_sentences: final_sentences.len(),
            });
        }
        if original.is_empty() {
            return Err(ScoreError::Empty);
        }

        tracing::info!(count = original.len(), "vectorizing original sentences");
        let original_vectors = self.embed_checked(original).await?;

        tracing::info!(count = final_sentences.len(), "vectorizing final sentences");
        let final_vectors = self.embed_checked(final_sentences).await?;

        let distances = original_vectors
            .iter()
            .zip(&final_vectors)
            .enumerate()
            .map(|(index, (a, b))| cosine_distance(a, b).map_err(|e| e.at_sentence(index + 1)))
            .collect::<Result<Vec<_>, _>>()?;

        summarize(distances)
    }

    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScoreError> {
        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(ScoreError::EmbeddingCount {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

/// `1 - cos(a, b)`, clamped to [0, 2]. A zero vector has similarity 0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, ScoreError> {
    if a.len() != b.len() {
        return Err(ScoreError::Dimension {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude = (norm_a * norm_b).sqrt();
    let similarity = if magnitude == 0.0 { 0.0 } else { dot / magnitude };

    Ok((1.0 - similarity).clamp(0.0, 2.0))
}

/// Mean, population std-dev, min, max and median of `distances`
pub fn summarize(distances: Vec<f64>) -> Result<QualityReport, ScoreError> {
    if distances.is_empty() {
        return Err(ScoreError::Empty);
    }

    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

    let mut sorted = distances.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    Ok(QualityReport {
        num_sentences: distances.len(),
        mean_distance: mean,
        std_distance: variance.sqrt(),
        min_distance: sorted[0],
        max_distance: sorted[sorted.len() - 1],
        median_distance: median,
        distances,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("original has {original} sentences but final has {final_sentences}")]
    LengthMismatch { original: usize, final_sentences: usize },

    #[error("nothing to score")]
    Empty,

    #[error("embedding failed: {0}")]
    Embedding(#[from] CapabilityError),

    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("embedding dimensions differ: {left} vs {right}")]
    Dimension { left: usize, right: usize },

    #[error("embedding dimensions differ at sentence {sentence}: {left} vs {right}")]
    DimensionAt { sentence: usize, left: usize, right: usize },
}

impl ScoreError {
    fn at_sentence(self, sentence: usize) -> Self {
        match self {
            ScoreError::Dimension { left, right } => ScoreError::DimensionAt { sentence, left, right },
            other => other,
        }
    }
}
