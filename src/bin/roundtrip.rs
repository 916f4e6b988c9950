// roundtrip - measure semantic drift across a closed loop of machine translations

use anyhow::Context;
use clap::Parser;
use roundtrip::pipeline::interrupt::EXIT_INTERRUPTED;
use roundtrip::pipeline::{
    self, CONFIG_FILE_NAME, ConfigError, Interrupt, Orchestrator, PipelineConfig, PipelineError, RunOutcome, RunRequest,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Round-trip translation drift: generate, translate around the loop, score", long_about = None)]
struct Args {
    /// Number of sentences to generate
    #[arg(short = 'n', long = "sentences", default_value = "20")]
    sentences: usize,

    /// Score the round trip (default)
    #[arg(long, overrides_with = "no_round_trip")]
    round_trip: bool,

    /// Only translate; skip embedding and scoring
    #[arg(long, overrides_with = "round_trip")]
    no_round_trip: bool,

    /// Topic the generated sentences should focus on
    #[arg(short, long)]
    topic: Option<String>,

    /// Config file (default: ./.roundtrip.json, then ~/.roundtrip.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for all artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Chat model for generation and translation
    #[arg(short, long)]
    model: Option<String>,

    /// Embedding model for scoring
    #[arg(long)]
    embedding_model: Option<String>,

    /// Re-score the artifacts of a previous run instead of running the loop
    #[arg(long)]
    rescore: bool,

    /// Write the effective configuration to ./.roundtrip.json and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("roundtrip={},ollama={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline_err) if pipeline_err.is_interrupted() => {
                    eprintln!("\n⚠ Interrupted: {}", pipeline_err);
                    EXIT_INTERRUPTED
                }
                _ => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            }
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (mut config, source) = PipelineConfig::load(args.config.as_deref())?;
    match &source {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME),
    }

    config.apply_env();
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(model) = args.embedding_model {
        config.embedding_model = model;
    }

    if args.init_config {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        config.write_to(&path)?;
        println!("✓ Wrote {}", path.display());
        return Ok(());
    }

    if let Err(e) = config.validate() {
        exit_invalid(&e);
    }
    if !args.rescore {
        if let Err(e) = config.validate_sentence_count(args.sentences) {
            exit_invalid(&e);
        }
    }

    let interrupt = Interrupt::new();
    interrupt.watch_ctrl_c();

    let mut orchestrator = Orchestrator::ollama(config)?.with_interrupt(interrupt);

    let outcome = if args.rescore {
        println!("🔁 Re-scoring previous run in {}", orchestrator.config().output_dir.display());
        orchestrator.rescore().await?
    } else {
        let request = RunRequest::new(args.sentences)
            .with_round_trip(args.round_trip || !args.no_round_trip)
            .with_topic(args.topic);

        println!("🌀 Round-trip translation pipeline");
        println!("================================");
        println!("📡 Model: {}", orchestrator.config().model);
        println!("📝 Sentences: {}", request.count);
        if let Some(topic) = &request.topic {
            println!("🎯 Topic: {}", topic);
        }
        println!();

        orchestrator
            .run(&request)
            .await
            .context("pipeline run failed")?
    };

    print_outcome(&outcome, orchestrator.config());
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, config: &PipelineConfig) {
    let distances = outcome.report.as_ref().map(|r| r.distances.as_slice());
    pipeline::report::print_translation_journey(&outcome.run, distances, config.journey_preview);
    pipeline::report::print_hop_summary(&outcome.run);

    if let Some(report) = &outcome.report {
        pipeline::report::print_statistics(report);
    }
    pipeline::report::print_file_summary(&outcome.artifacts);
}

fn exit_invalid(err: &ConfigError) -> ! {
    eprintln!("Error: Invalid arguments");
    for violation in err.violations() {
        eprintln!("  - {}", violation);
    }
    std::process::exit(1);
}
