// Orchestrator - drives generation, the translation loop and scoring

use super::agents::{self, AgentError, TranslationAgent};
use super::backend::OllamaBackend;
use super::capability::{CapabilityError, Embedder, GenerationCapability, GenerationRequest};
use super::config::{self, ConfigError, GENERATOR_PROFILE, PipelineConfig};
use super::interrupt::Interrupt;
use super::protocol::{self, GenerationError};
use super::report;
use super::scorer::{QualityScorer, ScoreError};
use super::store::{self, StoreError};
use super::types::{HopOutput, HopStats, LengthMismatch, PipelineRun, QualityReport};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the embedder the first time scoring needs one
pub type EmbedderFactory = Arc<dyn Fn() -> Result<Arc<dyn Embedder>, CapabilityError> + Send + Sync>;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Generating,
    /// 1-based hop number
    Translating(usize),
    Scoring,
    Reporting,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Idle => write!(f, "idle"),
            RunStage::Generating => write!(f, "generation"),
            RunStage::Translating(hop) => write!(f, "translation hop {}", hop),
            RunStage::Scoring => write!(f, "scoring"),
            RunStage::Reporting => write!(f, "reporting"),
            RunStage::Done => write!(f, "done"),
        }
    }
}

/// What to run
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub count: usize,
    pub round_trip: bool,
    pub topic: Option<String>,
}

impl RunRequest {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            round_trip: true,
            topic: None,
        }
    }

    pub fn with_round_trip(mut self, round_trip: bool) -> Self {
        self.round_trip = round_trip;
        self
    }

    pub fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic.filter(|t| !t.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: PipelineRun,
    /// Present only when the run was scored
    pub report: Option<QualityReport>,
    /// Every file written, in write order
    pub artifacts: Vec<PathBuf>,
}

pub struct Orchestrator {
    config: PipelineConfig,
    generator: Arc<dyn GenerationCapability>,
    generation_profile: String,
    agents: Vec<TranslationAgent>,
    embedder_factory: EmbedderFactory,
    embedder: Option<Arc<dyn Embedder>>,
    interrupt: Interrupt,
    stage: RunStage,
}

impl Orchestrator {
    /// `agents` must line up with `config.hops`: agent `i` writes hop `i`'s artifact.
    /// The generator's profile comes from `<prompts_dir>/generator.md` when present.
    pub fn new(
        config: PipelineConfig,
        generator: Arc<dyn GenerationCapability>,
        agents: Vec<TranslationAgent>,
        embedder_factory: EmbedderFactory,
    ) -> Result<Self, ConfigError> {
        if agents.len() != config.hops.len() {
            return Err(ConfigError::Invalid(vec![format!(
                "{} agents for {} configured hops",
                agents.len(),
                config.hops.len()
            )]));
        }

        let generation_profile = config::read_profile(config.prompts_dir.as_deref(), GENERATOR_PROFILE)?
            .unwrap_or_else(|| protocol::generation_profile().to_string());

        Ok(Self {
            config,
            generator,
            generation_profile,
            agents,
            embedder_factory,
            embedder: None,
            interrupt: Interrupt::new(),
            stage: RunStage::Idle,
        })
    }

    /// Everything backed by the Ollama server named in `config`
    pub fn ollama(config: PipelineConfig) -> Result<Self, PipelineError> {
        let backend = Arc::new(OllamaBackend::from_config(&config)?);
        tracing::info!(endpoint = %backend.endpoint(), model = %config.model, "using Ollama backend");

        let agents = agents::build_agents(&config, backend.clone())?;

        let embed_config = config.clone();
        let factory: EmbedderFactory = Arc::new(move || {
            tracing::info!(model = %embed_config.embedding_model, "loading embedding model");
            let embedder: Arc<dyn Embedder> = Arc::new(OllamaBackend::from_config(&embed_config)?);
            Ok(embedder)
        });

        Ok(Self::new(config, backend, agents, factory)?)
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Generate, translate through every hop, and optionally score.
    ///
    /// Each list is written to its artifact before the next stage starts.
    pub async fn run(&mut self, request: &RunRequest) -> Result<RunOutcome, PipelineError> {
        self.enter(RunStage::Idle);
        self.config.validate_sentence_count(request.count)?;
        let mut artifacts = Vec::new();

        self.enter(RunStage::Generating);
        let original = self.generate(request).await?;
        self.checkpoint()?;

        let original_path = self.config.original_path();
        store::save_sentences(&original, &original_path, self.config.numbered_artifacts).await?;
        artifacts.push(original_path);

        let mut run = PipelineRun::new(&self.config.source_language, original);

        for index in 0..self.agents.len() {
            self.enter(RunStage::Translating(index + 1));
            let agent = &self.agents[index];
            let hop = &self.config.hops[index];

            let results = agent
                .translate_batch_detailed(run.latest(), &self.interrupt)
                .await?;
            let stats = HopStats::from_results(&results, agent.low_confidence_threshold());
            let sentences: Vec<String> = results.into_iter().map(|r| r.translation).collect();

            let path = self.config.artifact_path(&hop.artifact);
            store::save_sentences(&sentences, &path, self.config.numbered_artifacts).await?;
            artifacts.push(path);

            run.hops.push(HopOutput {
                agent_id: agent.agent_id().to_string(),
                language: agent.target_language().to_string(),
                sentences,
                stats,
            });
        }

        run.check_aligned()?;

        let report = if request.round_trip {
            self.checkpoint()?;
            let report = self.score(&run).await?;
            artifacts.extend(self.write_report(&report).await?);
            Some(report)
        } else {
            tracing::info!("round-trip analysis skipped");
            None
        };

        self.enter(RunStage::Done);
        Ok(RunOutcome { run, report, artifacts })
    }

    /// Score the artifacts of a previous run without calling any translator
    pub async fn rescore(&mut self) -> Result<RunOutcome, PipelineError> {
        self.enter(RunStage::Idle);
        let previous = store::load_metrics(&self.config.metrics_path()).await.ok();

        let original = store::load_sentences(&self.config.original_path()).await?;
        let mut run = PipelineRun::new(&self.config.source_language, original);

        for hop in &self.config.hops {
            let sentences = store::load_sentences(&self.config.artifact_path(&hop.artifact)).await?;
            run.hops.push(HopOutput {
                agent_id: hop.agent_id.clone(),
                language: hop.target_language.clone(),
                sentences,
                stats: HopStats::default(),
            });
        }
        tracing::info!(count = run.len(), "loaded previous run from {}", self.config.output_dir.display());

        run.check_aligned()?;
        let report = self.score(&run).await?;
        if let Some(previous) = previous {
            tracing::info!(
                previous = previous.mean_distance,
                current = report.mean_distance,
                "Mean distance was {:.4} at {}, now {:.4}",
                previous.mean_distance,
                previous.timestamp.to_rfc3339(),
                report.mean_distance
            );
        }
        let artifacts = self.write_report(&report).await?;

        self.enter(RunStage::Done);
        Ok(RunOutcome {
            run,
            report: Some(report),
            artifacts,
        })
    }

    async fn generate(&self, request: &RunRequest) -> Result<Vec<String>, PipelineError> {
        let generation = GenerationRequest {
            count: request.count,
            topic: request.topic.clone(),
            max_words_per_sentence: self.config.max_sentence_words,
            language: self.config.source_language.clone(),
        };
        tracing::info!(
            count = request.count,
            topic = generation.topic.as_deref().unwrap_or("diverse"),
            "generating {} sentences",
            request.count
        );

        let raw = self.generator.generate(&self.generation_profile, &generation).await?;
        let sentences = protocol::parse_sentence_list(&raw)?;

        if sentences.len() != request.count {
            tracing::warn!(
                requested = request.count,
                received = sentences.len(),
                "Requested {} sentences but received {}; continuing with {}",
                request.count,
                sentences.len(),
                sentences.len()
            );
        }
        Ok(sentences)
    }

    async fn score(&mut self, run: &PipelineRun) -> Result<QualityReport, PipelineError> {
        self.enter(RunStage::Scoring);
        let embedder = self.embedder()?;
        let report = QualityScorer::new(embedder)
            .score(&run.original, run.final_sentences())
            .await?;
        tracing::info!(
            count = report.num_sentences,
            mean = report.mean_distance,
            "Mean distance: {:.4}",
            report.mean_distance
        );
        Ok(report)
    }

    async fn write_report(&mut self, report: &QualityReport) -> Result<Vec<PathBuf>, PipelineError> {
        self.enter(RunStage::Reporting);

        let metrics_path = self.config.metrics_path();
        store::save_metrics(report, &metrics_path).await?;

        let chart_path = self.config.chart_path();
        report::save_quality_chart(report, &chart_path, self.config.chart_width, self.config.chart_height).await?;

        Ok(vec![metrics_path, chart_path])
    }

    fn embedder(&mut self) -> Result<Arc<dyn Embedder>, CapabilityError> {
        if let Some(embedder) = &self.embedder {
            return Ok(embedder.clone());
        }
        let embedder = (self.embedder_factory)()?;
        self.embedder = Some(embedder.clone());
        Ok(embedder)
    }

    fn enter(&mut self, stage: RunStage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.interrupt.is_triggered() {
            Err(PipelineError::Interrupted(self.stage))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Model service error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Malformed generation response: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Run interrupted after {0}")]
    Interrupted(RunStage),

    #[error("Sentence lists are not aligned: {0}")]
    Alignment(#[from] LengthMismatch),

    #[error("Scoring failed: {0}")]
    Score(#[from] ScoreError),

    #[error("Artifact error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            PipelineError::Interrupted(_) | PipelineError::Agent(AgentError::Interrupted { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::capability::TranslationCapability;
    use crate::pipeline::fakes::{ScriptedGenerator, ScriptedTranslator, TableEmbedder, payload};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        factory_calls: Arc<AtomicUsize>,
        embedder: Arc<TableEmbedder>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_embedder(TableEmbedder::new())
        }

        fn with_embedder(embedder: TableEmbedder) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                factory_calls: Arc::new(AtomicUsize::new(0)),
                embedder: Arc::new(embedder),
            }
        }

        fn config(&self, min_sentences: usize) -> PipelineConfig {
            PipelineConfig {
                output_dir: self.dir.path().to_path_buf(),
                min_sentences,
                chart_width: 300,
                chart_height: 200,
                ..PipelineConfig::default()
            }
        }

        fn orchestrator(
            &self,
            config: PipelineConfig,
            generator: Arc<dyn GenerationCapability>,
            translator: Arc<dyn TranslationCapability>,
        ) -> Orchestrator {
            let agents: Vec<TranslationAgent> = agents::build_agents(&config, translator)
                .unwrap()
                .into_iter()
                .map(|a| a.with_retry(agents::RetryPolicy { max_retries: 0, ..Default::default() }))
                .collect();

            let calls = self.factory_calls.clone();
            let embedder = self.embedder.clone();
            let factory: EmbedderFactory = Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                let embedder: Arc<dyn Embedder> = embedder.clone();
                Ok(embedder)
            });

            Orchestrator::new(config, generator, agents, factory).unwrap()
        }
    }

    /// Everything a scored run writes, in write order
    fn scored_artifacts(config: &PipelineConfig) -> Vec<PathBuf> {
        let mut paths = vec![config.original_path()];
        paths.extend(config.hops.iter().map(|hop| config.artifact_path(&hop.artifact)));
        paths.push(config.metrics_path());
        paths.push(config.chart_path());
        paths
    }

    fn numbered(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("משפט מספר {}", i)).collect()
    }

    #[tokio::test]
    async fn test_full_run_produces_aligned_lists() {
        let harness = Harness::new();
        let original = numbered(10);
        let generator = Arc::new(ScriptedGenerator::new(serde_json::to_string(&original).unwrap()));
        let mut orchestrator = harness.orchestrator(
            harness.config(10),
            generator.clone(),
            Arc::new(ScriptedTranslator::identity()),
        );

        let outcome = orchestrator.run(&RunRequest::new(10)).await.unwrap();

        assert_eq!(generator.calls(), 1);
        let lists = outcome.run.lists();
        assert_eq!(lists.len(), 4);
        assert!(lists.iter().all(|list| list.len() == 10));
        assert_eq!(outcome.run.original, original);

        let report = outcome.report.unwrap();
        assert_eq!(report.num_sentences, 10);
        assert_eq!(report.mean_distance, 0.0);

        let expected = scored_artifacts(orchestrator.config());
        for path in &expected {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert_eq!(outcome.artifacts, expected);
        assert_eq!(orchestrator.stage(), RunStage::Done);
    }

    #[tokio::test]
    async fn test_failed_sentence_degrades_and_next_hop_runs() {
        let harness = Harness::new();
        let translator = Arc::new(ScriptedTranslator::new(|request| {
            if request.target_language == "fr" && request.sequence_id == 2 {
                Err(CapabilityError::Response("not json".into()))
            } else {
                Ok(payload(request, &request.text, 0.9))
            }
        }));
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["x", "y", "z"])),
            translator.clone(),
        );

        let outcome = orchestrator
            .run(&RunRequest::new(3).with_round_trip(false))
            .await
            .unwrap();

        let expected: Vec<String> = vec!["x".into(), String::new(), "z".into()];
        assert_eq!(outcome.run.hops[1].sentences, expected);
        assert_eq!(outcome.run.hops[1].stats.failed, 1);
        assert_eq!(outcome.run.hops[2].sentences, expected);
        // 3 sentences through 3 hops, the empty one included
        assert_eq!(translator.calls(), 9);
        assert!(outcome.report.is_none());

        let french = orchestrator.config().artifact_path("sentences_french.txt");
        assert_eq!(store::load_sentences(&french).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_hop_artifact_is_written_before_next_hop() {
        let harness = Harness::new();
        let english = harness.config(1).artifact_path("sentences_english.txt");
        let seen: Arc<Mutex<Option<Vec<String>>>> = Arc::new(Mutex::new(None));

        let snapshot = seen.clone();
        let translator = Arc::new(ScriptedTranslator::new(move |request| {
            if request.target_language == "fr" && request.sequence_id == 1 {
                let on_disk = std::fs::read_to_string(&english)
                    .map(|text| text.lines().map(|l| store::strip_index_prefix(l).to_string()).collect())
                    .unwrap_or_default();
                *snapshot.lock().unwrap() = Some(on_disk);
            }
            Ok(payload(request, &format!("{}>{}", request.text, request.target_language), 0.9))
        }));
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["a", "b", "c"])),
            translator,
        );

        let outcome = orchestrator
            .run(&RunRequest::new(3).with_round_trip(false))
            .await
            .unwrap();

        let hop1: Vec<String> = vec!["a>en".into(), "b>en".into(), "c>en".into()];
        assert_eq!(outcome.run.hops[0].sentences, hop1);
        assert_eq!(seen.lock().unwrap().clone(), Some(hop1));
    }

    #[tokio::test]
    async fn test_generator_profile_from_prompts_dir() {
        let harness = Harness::new();
        let prompts = tempfile::tempdir().unwrap();
        std::fs::write(prompts.path().join("generator.md"), "Write short sentences.").unwrap();

        let generator = Arc::new(ScriptedGenerator::sentences(&["a"]));
        let config = PipelineConfig {
            prompts_dir: Some(prompts.path().to_path_buf()),
            ..harness.config(1)
        };
        let mut orchestrator = harness.orchestrator(config, generator.clone(), Arc::new(ScriptedTranslator::identity()));
        orchestrator
            .run(&RunRequest::new(1).with_round_trip(false))
            .await
            .unwrap();
        assert_eq!(generator.profiles(), vec!["Write short sentences.".to_string()]);

        let fallback = Arc::new(ScriptedGenerator::sentences(&["a"]));
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            fallback.clone(),
            Arc::new(ScriptedTranslator::identity()),
        );
        orchestrator
            .run(&RunRequest::new(1).with_round_trip(false))
            .await
            .unwrap();
        assert_eq!(fallback.profiles(), vec![protocol::generation_profile().to_string()]);
    }

    #[tokio::test]
    async fn test_unscored_run_does_not_claim_stale_metrics() {
        let harness = Harness::new();
        let config = harness.config(1);
        std::fs::write(config.metrics_path(), "{}").unwrap();
        std::fs::write(config.chart_path(), "old").unwrap();

        let mut orchestrator = harness.orchestrator(
            config,
            Arc::new(ScriptedGenerator::sentences(&["a", "b"])),
            Arc::new(ScriptedTranslator::identity()),
        );
        let outcome = orchestrator
            .run(&RunRequest::new(2).with_round_trip(false))
            .await
            .unwrap();

        let config = orchestrator.config();
        assert_eq!(outcome.artifacts.len(), 4);
        assert!(!outcome.artifacts.contains(&config.metrics_path()));
        assert!(!outcome.artifacts.contains(&config.chart_path()));
    }

    #[tokio::test]
    async fn test_stage_resets_on_each_run() {
        let harness = Harness::new();
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::failing(CapabilityError::Timeout)),
            Arc::new(ScriptedTranslator::identity()),
        );

        assert!(orchestrator.run(&RunRequest::new(2)).await.is_err());
        assert_eq!(orchestrator.stage(), RunStage::Generating);

        // rejected before generation, so nothing but the reset happens
        assert!(orchestrator.run(&RunRequest::new(0)).await.is_err());
        assert_eq!(orchestrator.stage(), RunStage::Idle);
    }

    #[tokio::test]
    async fn test_single_identical_sentence_scores_zero() {
        let harness = Harness::with_embedder(TableEmbedder::new().with("The cat sleeps.", vec![0.4, 0.1, 0.9]));
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["The cat sleeps."])),
            Arc::new(ScriptedTranslator::identity()),
        );

        let report = orchestrator.run(&RunRequest::new(1)).await.unwrap().report.unwrap();
        assert_eq!(report.num_sentences, 1);
        assert_eq!(report.mean_distance, 0.0);
        assert_eq!(report.distances, vec![0.0]);
    }

    #[tokio::test]
    async fn test_count_below_minimum_is_rejected_before_generation() {
        let harness = Harness::new();
        let generator = Arc::new(ScriptedGenerator::sentences(&["a"]));
        let mut orchestrator = harness.orchestrator(
            harness.config(10),
            generator.clone(),
            Arc::new(ScriptedTranslator::identity()),
        );

        let err = orchestrator.run(&RunRequest::new(5)).await.unwrap_err();
        match err {
            PipelineError::Config(config_err) => assert_eq!(
                config_err.violations(),
                vec!["Number of sentences must be at least 10".to_string()]
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(generator.calls(), 0);
        assert_eq!(orchestrator.stage(), RunStage::Idle);
    }

    #[tokio::test]
    async fn test_non_list_generation_is_fatal() {
        let harness = Harness::new();
        let translator = Arc::new(ScriptedTranslator::identity());
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::new(r#"{"sentences": ["a", "b"]}"#)),
            translator.clone(),
        );

        let err = orchestrator.run(&RunRequest::new(2)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(GenerationError::NotAList("object"))));
        assert_eq!(translator.calls(), 0);
        assert!(!orchestrator.config().original_path().exists());
    }

    #[tokio::test]
    async fn test_count_mismatch_continues_with_received_list() {
        let harness = Harness::new();
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["one", "two"])),
            Arc::new(ScriptedTranslator::identity()),
        );

        let outcome = orchestrator.run(&RunRequest::new(3)).await.unwrap();
        assert_eq!(outcome.run.len(), 2);
        assert_eq!(outcome.report.unwrap().num_sentences, 2);
    }

    #[tokio::test]
    async fn test_generation_service_error_is_fatal() {
        let harness = Harness::new();
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::failing(CapabilityError::Timeout)),
            Arc::new(ScriptedTranslator::identity()),
        );

        let err = orchestrator.run(&RunRequest::new(2)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Capability(CapabilityError::Timeout)));
    }

    #[tokio::test]
    async fn test_embedder_is_created_lazily_once() {
        let harness = Harness::new();
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["a", "b"])),
            Arc::new(ScriptedTranslator::identity()),
        );

        orchestrator
            .run(&RunRequest::new(2).with_round_trip(false))
            .await
            .unwrap();
        assert_eq!(harness.factory_calls.load(Ordering::SeqCst), 0);
        assert!(!orchestrator.config().metrics_path().exists());

        orchestrator.run(&RunRequest::new(2)).await.unwrap();
        orchestrator.rescore().await.unwrap();
        assert_eq!(harness.factory_calls.load(Ordering::SeqCst), 1);
        // two embedding calls per scoring pass
        assert_eq!(harness.embedder.batches().len(), 4);
    }

    #[tokio::test]
    async fn test_rescore_reads_previous_artifacts() {
        let harness = Harness::new();
        let mut orchestrator = harness.orchestrator(
            harness.config(1),
            Arc::new(ScriptedGenerator::sentences(&["a", "b", "c"])),
            Arc::new(ScriptedTranslator::identity()),
        );
        orchestrator
            .run(&RunRequest::new(3).with_round_trip(false))
            .await
            .unwrap();

        let outcome = orchestrator.rescore().await.unwrap();
        assert_eq!(outcome.run.hops.len(), 3);
        assert_eq!(outcome.report.unwrap().num_sentences, 3);
        assert!(orchestrator.config().metrics_path().exists());
        assert!(orchestrator.config().chart_path().exists());
    }

    #[tokio::test]
    async fn test_rescore_rejects_unequal_lists() {
        let harness = Harness::new();
        let config = harness.config(1);
        store::save_sentences(&["a".to_string(), "b".to_string()], &config.original_path(), true)
            .await
            .unwrap();
        for hop in &config.hops {
            store::save_sentences(&["a".to_string()], &config.artifact_path(&hop.artifact), true)
                .await
                .unwrap();
        }
        let mut orchestrator = harness.orchestrator(
            config,
            Arc::new(ScriptedGenerator::sentences(&["unused"])),
            Arc::new(ScriptedTranslator::identity()),
        );

        let err = orchestrator.rescore().await.unwrap_err();
        assert!(matches!(err, PipelineError::Alignment(_)));
        assert_eq!(harness.factory_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interrupt_leaves_no_partial_hop_artifact() {
        let harness = Harness::new();
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        let translator = Arc::new(ScriptedTranslator::new(move |request| {
            trigger.trigger();
            Ok(payload(request, &request.text, 0.9))
        }));
        let mut orchestrator = harness
            .orchestrator(
                harness.config(1),
                Arc::new(ScriptedGenerator::sentences(&["a", "b", "c"])),
                translator.clone(),
            )
            .with_interrupt(interrupt);

        let err = orchestrator.run(&RunRequest::new(3)).await.unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(translator.calls(), 1);

        let config = orchestrator.config();
        assert!(config.original_path().exists());
        assert!(!config.artifact_path("sentences_english.txt").exists());
    }

    #[test]
    fn test_agent_count_must_match_hops() {
        let config = PipelineConfig::default();
        let factory: EmbedderFactory = Arc::new(|| Err(CapabilityError::Timeout));
        let result = Orchestrator::new(
            config,
            Arc::new(ScriptedGenerator::sentences(&["a"])),
            Vec::new(),
            factory,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(RunStage::Translating(2).to_string(), "translation hop 2");
        assert_eq!(PipelineError::Interrupted(RunStage::Generating).to_string(), "Run interrupted after generation");
    }
}
