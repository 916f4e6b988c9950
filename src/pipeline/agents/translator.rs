// Translation agent - one language pair bound to a translation capability

use super::AgentError;
use crate::pipeline::capability::TranslationCapability;
use crate::pipeline::config::{self, ConfigError, HopConfig, PipelineConfig};
use crate::pipeline::interrupt::Interrupt;
use crate::pipeline::protocol;
use crate::pipeline::types::{HopStats, TranslationRequest, TranslationResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How often and how patiently a failed call is repeated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Exponential: backoff, 2*backoff, 4*backoff, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Translates from one fixed language into another.
///
/// Holds no per-call state; every call builds its own request.
pub struct TranslationAgent {
    agent_id: String,
    source_language: String,
    target_language: String,
    profile: String,
    capability: Arc<dyn TranslationCapability>,
    retry: RetryPolicy,
    low_confidence_threshold: f64,
}

impl TranslationAgent {
    pub fn new(
        agent_id: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        profile: impl Into<String>,
        capability: Arc<dyn TranslationCapability>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            profile: profile.into(),
            capability,
            retry: RetryPolicy::default(),
            low_confidence_threshold: 0.7,
        }
    }

    /// Build the agent for `hop`, loading its profile once
    pub fn from_config(
        hop: &HopConfig,
        config: &PipelineConfig,
        capability: Arc<dyn TranslationCapability>,
    ) -> Result<Self, ConfigError> {
        let profile = load_profile(hop, config.prompts_dir.as_deref())?;

        Ok(Self::new(
            &hop.agent_id,
            &hop.source_language,
            &hop.target_language,
            profile,
            capability,
        )
        .with_retry(RetryPolicy {
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        })
        .with_low_confidence_threshold(config.low_confidence_threshold))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.low_confidence_threshold = threshold;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn low_confidence_threshold(&self) -> f64 {
        self.low_confidence_threshold
    }

    /// Translate one sentence. Never fails: errors come back as the
    /// canonical failure result.
    pub async fn translate_one(&self, sequence_id: u32, text: &str) -> TranslationResult {
        let request = TranslationRequest::new(sequence_id, text, &self.source_language, &self.target_language);
        self.translate_request(&request).await
    }

    pub async fn translate_request(&self, request: &TranslationRequest) -> TranslationResult {
        let mut attempt = 0;
        loop {
            match self.capability.translate(&self.profile, request).await {
                Ok(raw) => return protocol::translation_outcome(&raw, request, &self.agent_id),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        agent = %self.agent_id,
                        sequence_id = request.sequence_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "translation call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return TranslationResult::failure(request.sequence_id, &self.agent_id, e),
            }
        }
    }

    /// Translate every sentence in order and keep only the text.
    /// Failed sentences come back as empty strings.
    pub async fn translate_batch(&self, sentences: &[String]) -> Vec<String> {
        self.run_batch(sentences, || false)
            .await
            .into_iter()
            .map(|result| result.translation)
            .collect()
    }

    /// Like [`translate_batch`](Self::translate_batch) but keeps the full
    /// results and stops between sentences once `interrupt` fires.
    pub async fn translate_batch_detailed(
        &self,
        sentences: &[String],
        interrupt: &Interrupt,
    ) -> Result<Vec<TranslationResult>, AgentError> {
        let results = self.run_batch(sentences, || interrupt.is_triggered()).await;
        if results.len() < sentences.len() {
            return Err(AgentError::Interrupted {
                agent_id: self.agent_id.clone(),
                completed: results.len(),
                total: sentences.len(),
            });
        }
        Ok(results)
    }

    async fn run_batch(&self, sentences: &[String], stop: impl Fn() -> bool + Send + Sync) -> Vec<TranslationResult> {
        let total = sentences.len();
        tracing::info!(agent = %self.agent_id, count = total, "{} processing {} sentences", self.agent_id, total);

        let mut results = Vec::with_capacity(total);
        for (index, sentence) in sentences.iter().enumerate() {
            if stop() {
                tracing::warn!(agent = %self.agent_id, completed = index, total, "batch interrupted");
                break;
            }

            let sequence_id = (index + 1) as u32;
            let result = self.translate_one(sequence_id, sentence).await;

            if result.is_failure() {
                tracing::warn!(agent = %self.agent_id, sequence_id, notes = %result.notes, "translation failed");
            } else if result.confidence < self.low_confidence_threshold {
                tracing::warn!(
                    agent = %self.agent_id,
                    sequence_id,
                    confidence = result.confidence,
                    "Low confidence ({:.2}) on sentence {}",
                    result.confidence,
                    sequence_id
                );
            }
            tracing::debug!(agent = %self.agent_id, "{}/{}", sequence_id, total);

            results.push(result);
        }

        let stats = HopStats::from_results(&results, self.low_confidence_threshold);
        tracing::info!(
            agent = %self.agent_id,
            succeeded = stats.succeeded,
            low_confidence = stats.low_confidence,
            failed = stats.failed,
            "batch finished"
        );

        results
    }
}

/// `<prompts_dir>/<agent_id>.md` if present, otherwise the built-in profile
fn load_profile(hop: &HopConfig, prompts_dir: Option<&Path>) -> Result<String, ConfigError> {
    Ok(config::read_profile(prompts_dir, &hop.agent_id)?
        .unwrap_or_else(|| protocol::default_profile(&hop.source_language, &hop.target_language)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::CapabilityError;
    use crate::pipeline::fakes::{ScriptedTranslator, payload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn agent(capability: Arc<dyn TranslationCapability>) -> TranslationAgent {
        TranslationAgent::new("agent1_hebrew_to_english", "he", "en", "profile", capability).with_retry(RetryPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        })
    }

    fn sentences(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_ids() {
        let capability = Arc::new(ScriptedTranslator::new(|request| {
            Ok(payload(request, &request.text.to_uppercase(), 0.9))
        }));
        let agent = agent(capability.clone());

        let output = agent.translate_batch(&sentences(&["a", "b", "c"])).await;
        assert_eq!(output, sentences(&["A", "B", "C"]));

        let ids: Vec<u32> = capability.requests().iter().map(|r| r.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(capability.requests().iter().all(|r| r.source_language == "he" && r.target_language == "en"));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty_string() {
        let capability = Arc::new(ScriptedTranslator::new(|request| {
            if request.sequence_id == 2 {
                Ok("I'm sorry, I can't do that.".to_string())
            } else {
                Ok(payload(request, &request.text, 0.9))
            }
        }));
        let agent = agent(capability);

        let output = agent.translate_batch(&sentences(&["x", "y", "z"])).await;
        assert_eq!(output, sentences(&["x", "", "z"]));
    }

    #[tokio::test]
    async fn test_reported_failure_does_not_leak_text() {
        let capability = Arc::new(ScriptedTranslator::new(|request| {
            if request.sequence_id == 1 {
                Ok(r#"{"translation": "bonjour", "confidence": 0.0, "notes": "unsure about idiom"}"#.to_string())
            } else {
                Ok(payload(request, &request.text, 0.9))
            }
        }));
        let agent = agent(capability);

        let results = agent
            .translate_batch_detailed(&sentences(&["hello", "b"]), &Interrupt::new())
            .await
            .unwrap();
        assert!(results[0].is_failure());
        assert_eq!(results[0].translation, "");
        assert_eq!(HopStats::from_results(&results, 0.7).failed, 1);

        let output = agent.translate_batch(&sentences(&["hello", "b"])).await;
        assert_eq!(output, sentences(&["", "b"]));
    }

    #[tokio::test]
    async fn test_empty_input_is_still_translated() {
        let capability = Arc::new(ScriptedTranslator::identity());
        let agent = agent(capability.clone());

        let output = agent.translate_batch(&sentences(&["", "b"])).await;
        assert_eq!(output, sentences(&["", "b"]));
        assert_eq!(capability.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let capability = Arc::new(ScriptedTranslator::new(move |request| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CapabilityError::Timeout)
            } else {
                Ok(payload(request, "hello", 0.99))
            }
        }));
        let agent = agent(capability.clone());

        let result = agent.translate_one(1, "שלום").await;
        assert_eq!(result.translation, "hello");
        assert_eq!(capability.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let capability = Arc::new(ScriptedTranslator::new(|_| Err(CapabilityError::Network("refused".into()))));
        let agent = agent(capability.clone());

        let result = agent.translate_one(4, "text").await;
        assert!(result.is_failure());
        assert_eq!(result.sequence_id, 4);
        assert_eq!(result.agent_id, "agent1_hebrew_to_english");
        assert_eq!(capability.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let capability = Arc::new(ScriptedTranslator::new(|_| {
            Err(CapabilityError::Service {
                status: 404,
                message: "model not found".into(),
            })
        }));
        let agent = agent(capability.clone());

        let result = agent.translate_one(1, "text").await;
        assert!(result.is_failure());
        assert!(result.notes.contains("model not found"));
        assert_eq!(capability.calls(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_stops_between_sentences() {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        let capability = Arc::new(ScriptedTranslator::new(move |request| {
            if request.sequence_id == 2 {
                trigger.trigger();
            }
            Ok(payload(request, &request.text, 0.9))
        }));
        let agent = agent(capability.clone());

        let err = agent
            .translate_batch_detailed(&sentences(&["a", "b", "c", "d"]), &interrupt)
            .await
            .unwrap_err();
        match err {
            AgentError::Interrupted { completed, total, .. } => {
                assert_eq!(completed, 2);
                assert_eq!(total, 4);
            }
        }
        assert_eq!(capability.calls(), 2);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_profile_from_prompts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let hop = HopConfig::new("agent2_english_to_french", "en", "fr", "sentences_french.txt");
        std::fs::write(dir.path().join("agent2_english_to_french.md"), "Translate carefully.").unwrap();

        assert_eq!(load_profile(&hop, Some(dir.path())).unwrap(), "Translate carefully.");

        let other = HopConfig::new("agent3_french_to_hebrew", "fr", "he", "x.txt");
        assert!(load_profile(&other, Some(dir.path())).unwrap().contains("French-to-Hebrew"));
        assert!(load_profile(&other, None).unwrap().contains("French-to-Hebrew"));
    }
}
