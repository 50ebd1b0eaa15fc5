//! covboost - automated test-coverage improvement
//!
//! ## Commands
//!
//! - `analyze`: measure coverage and pick an under-tested file
//! - `generate`: ask the model for tests and build a candidate file
//! - `validate`: build/test the candidate with rollback and regeneration
//! - `report`: re-measure coverage and render the before/after report
//! - `run`: all four in sequence
//!
//! Stages communicate only through the artifacts in `--output-dir`, so each
//! one can be re-run on its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn, Level};

use covboost_ci::{CoverageProbe, StageConfig, VerifyPipeline};
use covboost_core::artifacts::{self, ArtifactStore};
use covboost_core::context::{DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_MAX_RETRIES};
use covboost_core::{
    CandidateSource, CoverageReport, GenerationMetadata, GenerationStage, RunContext, RunSpan,
    SelectionRecord, ValidationOutcome, Validator,
};
use covboost_gen::{GenConfig, ModelsClient, DEFAULT_ENDPOINT};

/// Timeout for each `--verify-cmd` stage.
const CUSTOM_STAGE_TIMEOUT_SECS: u64 = 600;

#[derive(Parser)]
#[command(name = "covboost")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated, transactional test-coverage improvement", long_about = None)]
struct Cli {
    /// Project workspace (build, test and coverage commands run here)
    #[arg(long, global = true, env = "COVBOOST_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Directory for inter-stage artifacts
    #[arg(long, global = true, env = "COVBOOST_OUTPUT_DIR", default_value = ".covboost")]
    output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure coverage and select the file to improve
    Analyze(AnalyzeArgs),

    /// Generate tests for the selected file and write the candidate
    Generate(GenArgs),

    /// Validate the candidate, regenerating on failure
    Validate(ValidateArgs),

    /// Re-measure coverage and write the report
    Report {
        /// Read the after-coverage export from a file instead of running cargo llvm-cov
        #[arg(long)]
        coverage_json: Option<PathBuf>,
    },

    /// Analyze, generate, validate and report in one go
    Run {
        #[command(flatten)]
        analyze: AnalyzeArgs,

        #[command(flatten)]
        validate: ValidateArgs,

        /// After-coverage export for the report stage
        #[arg(long)]
        after_coverage_json: Option<PathBuf>,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Read the coverage export from a file instead of running cargo llvm-cov
    #[arg(long)]
    coverage_json: Option<PathBuf>,

    /// Seed for the selection within the worst decile
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct GenArgs {
    /// Generation model identifier [default: gpt-4o-mini; validate reuses
    /// the model recorded by generate]
    #[arg(long, env = "COVBOOST_MODEL")]
    model: Option<String>,

    /// Chat-completions endpoint URL
    #[arg(long, env = "COVBOOST_MODELS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Upper bound on one generation call, in seconds
    #[arg(long, default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS)]
    generation_timeout: u64,
}

#[derive(Args)]
struct ValidateArgs {
    /// Maximum build/test attempts
    #[arg(long, env = "COVBOOST_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Verification command replacing cargo check + cargo test (repeatable)
    #[arg(long = "verify-cmd")]
    verify_cmd: Vec<String>,

    #[command(flatten)]
    gen: GenArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    covboost_core::init_tracing(cli.json, level);

    let base = RunContext::new(&cli.workspace, &cli.output_dir);

    match cli.command {
        Commands::Analyze(args) => {
            cmd_analyze(&base, args.coverage_json.as_deref(), args.seed).await?;
        }
        Commands::Generate(gen) => {
            let ctx = with_gen(base, &gen);
            cmd_generate(&ctx, &gen).await?;
        }
        Commands::Validate(args) => {
            let ctx = with_gen(base, &args.gen).with_max_retries(args.max_retries);
            cmd_validate(&ctx, &args.gen, &args.verify_cmd).await?;
        }
        Commands::Report { coverage_json } => {
            cmd_report(&base, coverage_json.as_deref()).await?;
        }
        Commands::Run {
            analyze,
            validate,
            after_coverage_json,
        } => {
            let ctx = with_gen(base, &validate.gen).with_max_retries(validate.max_retries);
            cmd_analyze(&ctx, analyze.coverage_json.as_deref(), analyze.seed).await?;
            cmd_generate(&ctx, &validate.gen).await?;
            cmd_validate(&ctx, &validate.gen, &validate.verify_cmd).await?;
            cmd_report(&ctx, after_coverage_json.as_deref()).await?;
        }
    }
    Ok(())
}

fn with_gen(ctx: RunContext, gen: &GenArgs) -> RunContext {
    let ctx = match &gen.model {
        Some(model) => ctx.with_model(model),
        None => ctx,
    };
    ctx.with_generation_timeout(Duration::from_secs(gen.generation_timeout))
}

/// Keep the model recorded by `generate` unless one was given explicitly.
fn with_recorded_model(ctx: &RunContext, gen: &GenArgs, meta: &GenerationMetadata) -> RunContext {
    match gen.model {
        Some(_) => ctx.clone(),
        None => ctx.clone().with_model(&meta.model_id),
    }
}

fn build_client(ctx: &RunContext, gen: &GenArgs) -> Result<ModelsClient> {
    let mut config = GenConfig::new(&gen.endpoint, &ctx.model_id)
        .with_timeout(ctx.generation_timeout);
    if let Some(token) = gen.token.as_deref().filter(|t| !t.is_empty()) {
        config = config.with_token(token);
    } else {
        warn!("no API token configured; generation calls will fail");
    }
    ModelsClient::new(config).context("Failed to build generation client")
}

fn verify_stages(commands: &[String]) -> Result<Vec<StageConfig>> {
    commands
        .iter()
        .map(|c| {
            StageConfig::parse(c, CUSTOM_STAGE_TIMEOUT_SECS)
                .with_context(|| format!("Empty --verify-cmd: {:?}", c))
        })
        .collect()
}

/// Select the target file.
async fn cmd_analyze(
    ctx: &RunContext,
    coverage_json: Option<&Path>,
    seed: Option<u64>,
) -> Result<SelectionRecord> {
    let _span = RunSpan::enter(&ctx.run_id.to_string(), "analyze");
    ctx.check()?;
    let store = ctx.artifacts();

    let measured = CoverageProbe::new(&ctx.workspace)
        .measure_or_load(coverage_json)
        .await
        .context("Failed to obtain coverage data")?;
    store.write_text(artifacts::COVERAGE_BEFORE, &measured.raw)?;

    let seed = seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, "selection seed");
    let mut rng = StdRng::seed_from_u64(seed);
    let selection = covboost_core::select(&measured.dataset, &mut rng)?;
    let path = store.write_json(artifacts::SELECTION, &selection)?;

    println!("Selected:  {}", selection.path.display());
    println!(
        "Coverage:  {:.2}% ({}/{} lines)",
        selection.coverage_percent, selection.coverage.lines_covered, selection.coverage.lines_total
    );
    println!(
        "Rank:      {} within the worst {} of {} eligible files",
        selection.rank, selection.decile_size, selection.eligible_files
    );
    println!("Written:   {}", path.display());
    Ok(selection)
}

/// Produce the first candidate.
async fn cmd_generate(ctx: &RunContext, gen: &GenArgs) -> Result<()> {
    let _span = RunSpan::enter(&ctx.run_id.to_string(), "generate");
    ctx.check()?;
    let store = ctx.artifacts();

    let selection = store.load_selection()?;
    let client = build_client(ctx, gen)?;
    let stage = GenerationStage::prepare(ctx, &selection, Arc::new(client))?;
    let artifact = stage
        .next_candidate(1)
        .await
        .context("Test generation failed")?;

    println!("Target:    {}", artifact.original_path.display());
    println!("Model:     {}", artifact.model_id);
    println!(
        "Generated: {} lines of test code",
        artifact.generated_tests.lines().count()
    );
    println!("Candidate: {}", store.path(artifacts::CANDIDATE).display());
    Ok(())
}

/// Validate the candidate and record the result in `generation.json`.
async fn cmd_validate(
    ctx: &RunContext,
    gen: &GenArgs,
    verify_cmd: &[String],
) -> Result<ValidationOutcome> {
    let _span = RunSpan::enter(&ctx.run_id.to_string(), "validate");
    ctx.check()?;
    let store = ctx.artifacts();

    let selection = store.load_selection()?;
    let (meta, initial) = store.load_candidate()?;
    let target = meta.original_path.clone();
    let ctx = &with_recorded_model(ctx, gen, &meta);
    info!(model = %ctx.model_id, "regeneration model");

    let client = build_client(ctx, gen)?;
    let regenerate = GenerationStage::prepare(ctx, &selection, Arc::new(client))?;
    let verifier = if verify_cmd.is_empty() {
        VerifyPipeline::cargo(&ctx.workspace)
    } else {
        VerifyPipeline::with_stages(&ctx.workspace, verify_stages(verify_cmd)?)
    };

    let mut validator = Validator::new(&target, ctx.max_retries, &regenerate, &verifier)
        .with_initial_candidate(initial);
    let outcome = validator.validate().await?;

    record_outcome(&store, &outcome)?;

    if outcome.success {
        println!(
            "Committed: {} after {} attempt(s)",
            target.display(),
            outcome.attempts
        );
    } else {
        println!(
            "Rolled back: {} restored after {} failed attempt(s)",
            target.display(),
            outcome.attempts
        );
    }
    Ok(outcome.into_result()?)
}

/// Store the validation result next to the metadata of the last candidate.
fn record_outcome(store: &ArtifactStore, outcome: &ValidationOutcome) -> Result<()> {
    let mut meta = store.load_generation()?;
    meta.validation_success = Some(outcome.success);
    meta.validation_attempts = Some(outcome.attempts);
    meta.validation_error = outcome.last_error.clone();
    store.write_json(artifacts::GENERATION, &meta)?;
    Ok(())
}

/// Re-measure and render the report.
async fn cmd_report(ctx: &RunContext, coverage_json: Option<&Path>) -> Result<CoverageReport> {
    let _span = RunSpan::enter(&ctx.run_id.to_string(), "report");
    let store = ctx.artifacts();

    let selection = store.load_selection()?;
    let meta = store.load_generation()?;
    let (success, attempts) = meta.require_validation(artifacts::GENERATION)?;

    let measured = CoverageProbe::new(&ctx.workspace)
        .measure_or_load(coverage_json)
        .await
        .context("Failed to obtain post-validation coverage data")?;
    store.write_text(artifacts::COVERAGE_AFTER, &measured.raw)?;

    let outcome = ValidationOutcome {
        success,
        attempts,
        last_error: meta.validation_error.clone(),
        committed_sha256: success.then(|| meta.candidate_sha256.clone()),
        failures: Vec::new(),
    };
    let report = covboost_core::report(&selection, &measured.dataset, &outcome, &meta.model_id);
    let (md, json) = covboost_core::write_report(&store, &report)?;

    println!("{}", covboost_core::render_markdown(&report));
    println!("Report:    {}", md.display());
    println!("Stats:     {}", json.display());
    Ok(report)
}
