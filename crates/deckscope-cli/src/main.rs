//! deckscope - pitch-deck analysis pipelines from the command line
//!
//! ## Commands
//!
//! - `score`: weighted overall score (and percentile) for a list of scores
//! - `dedupe`: consolidate and rank a list of findings
//! - `map`: remap deck category scores onto the investor rubric
//! - `run`: run a pipeline offline against a plain-text deck
//! - `show` / `runs`: inspect persisted runs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deckscope_core::dedup;
use deckscope_core::{
    percentile_rank, weighted_overall, BroadcastProgress, CategoryMapper, DeckCategory,
    DeckscopeConfig, FindingRecord, PipelineDefinition, PipelineKind, PipelineRunRecord,
    PipelineStore, RunId, ScoreCategory, ScoreRecord, ScriptedModelClient, Severity,
    StageOrchestrator, TextRetriever,
};
use deckscope_state::{ExecutionRecord, ExecutionStatus, SurrealPipelineStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "deckscope")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pitch-deck analysis pipeline orchestrator", long_about = None)]
struct Cli {
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
    /// Weighted overall score of a JSON array of `{score, weight}` objects
    Score {
        /// Scores JSON file
        input: PathBuf,

        /// Benchmark scores for a percentile rank (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        benchmark: Vec<f64>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Deduplicate, filter and sort a JSON array of findings
    Dedupe {
        /// Findings JSON file
        input: PathBuf,

        /// Keep findings at least this severe (critical, major, minor, info)
        #[arg(long)]
        min_severity: Option<Severity>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Map deck category scores onto the investor rubric
    Map {
        /// JSON array of `{category, score, weight}` objects
        input: PathBuf,

        /// Config file with an optional [category_mapping] table
        #[arg(short, long, env = "DECKSCOPE_CONFIG")]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Run a pipeline against a plain-text deck with scripted model replies
    Run {
        /// Pipeline to run (scoring, analysis, category)
        #[arg(short, long)]
        pipeline: PipelineKind,

        /// Plain-text deck; paragraphs are the retrieval units
        #[arg(short, long)]
        deck: PathBuf,

        /// JSON object mapping agent names to model replies
        #[arg(short, long)]
        responses: PathBuf,

        /// Reply for agents missing from the responses file
        #[arg(long)]
        fallback: Option<String>,

        /// Document id (default: the deck's file stem)
        #[arg(long)]
        document_id: Option<String>,

        /// Company name used in prompts
        #[arg(long)]
        company: Option<String>,

        /// Config file (TOML)
        #[arg(short, long, env = "DECKSCOPE_CONFIG")]
        config: Option<PathBuf>,

        /// Database URL (mem://, surrealkv://path, ws://host:port)
        #[arg(long, env = "DECKSCOPE_DB_URL")]
        db: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show a persisted run with its executions, scores and findings
    Show {
        /// Run ID
        run_id: String,

        /// Database URL
        #[arg(long, env = "DECKSCOPE_DB_URL")]
        db: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List persisted runs, newest first
    Runs {
        /// Only runs of this pipeline
        #[arg(short, long)]
        pipeline: Option<PipelineKind>,

        /// Database URL
        #[arg(long, env = "DECKSCOPE_DB_URL")]
        db: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    deckscope_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Score {
            input,
            benchmark,
            format,
        } => cmd_score(&input, &benchmark, format),
        Commands::Dedupe {
            input,
            min_severity,
            format,
        } => cmd_dedupe(&input, min_severity, format),
        Commands::Map {
            input,
            config,
            format,
        } => cmd_map(&input, config.as_deref(), format),
        Commands::Run {
            pipeline,
            deck,
            responses,
            fallback,
            document_id,
            company,
            config,
            db,
            format,
        } => {
            let args = RunArgs {
                pipeline,
                deck,
                responses,
                fallback,
                document_id,
                company,
                config,
            };
            let store = open_store(db.as_deref()).await?;
            let report = run_offline(store, &args).await?;
            print_report(&report, format)
        }
        Commands::Show { run_id, db, format } => {
            let store = open_store(db.as_deref()).await?;
            let report = load_report(store.as_ref(), &RunId(run_id)).await?;
            print_report(&report, format)
        }
        Commands::Runs { pipeline, db } => {
            let store = open_store(db.as_deref()).await?;
            cmd_runs(store.as_ref(), pipeline).await
        }
    }
}

// ---------------------------------------------------------------------------
// score / dedupe / map
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WeightedInput {
    score: f64,
    weight: f64,
}

#[derive(Debug, Serialize, PartialEq)]
struct ScoreSummary {
    overall: f64,
    count: usize,
    percentile: Option<f64>,
}

fn score_summary(inputs: &[WeightedInput], benchmark: &[f64]) -> ScoreSummary {
    let pairs: Vec<(f64, f64)> = inputs.iter().map(|i| (i.score, i.weight)).collect();
    let overall = weighted_overall(&pairs);
    ScoreSummary {
        overall,
        count: inputs.len(),
        percentile: (!benchmark.is_empty()).then(|| percentile_rank(overall, benchmark)),
    }
}

fn cmd_score(input: &Path, benchmark: &[f64], format: Format) -> Result<()> {
    let inputs: Vec<WeightedInput> = read_json_file(input)?;
    let summary = score_summary(&inputs, benchmark);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Format::Text => {
            println!("Overall score: {} ({} scores)", summary.overall, summary.count);
            if let Some(p) = summary.percentile {
                println!("Percentile:    {}", p);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DedupeSummary {
    input_count: usize,
    findings: Vec<FindingRecord>,
    counts: Vec<SeverityCount>,
}

#[derive(Debug, Serialize, PartialEq)]
struct SeverityCount {
    severity: Severity,
    count: usize,
}

fn dedupe_summary(findings: Vec<FindingRecord>, min_severity: Option<Severity>) -> DedupeSummary {
    let input_count = findings.len();
    let mut consolidated = dedup::sort_by_severity(dedup::dedupe(findings));
    if let Some(threshold) = min_severity {
        consolidated = dedup::filter_by_severity(consolidated, threshold);
    }
    let counts = dedup::count_by_severity(&consolidated)
        .into_values()
        .map(|(severity, count)| SeverityCount { severity, count })
        .collect();
    DedupeSummary {
        input_count,
        findings: consolidated,
        counts,
    }
}

fn cmd_dedupe(input: &Path, min_severity: Option<Severity>, format: Format) -> Result<()> {
    let findings: Vec<FindingRecord> = read_json_file(input)?;
    let summary = dedupe_summary(findings, min_severity);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Format::Text => {
            println!(
                "{} findings ({} before consolidation)",
                summary.findings.len(),
                summary.input_count
            );
            for c in &summary.counts {
                println!("  {:<9} {}", c.severity.as_str(), c.count);
            }
            println!();
            print_findings(&summary.findings);
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct DeckScoreInput {
    category: DeckCategory,
    score: f64,
    weight: f64,
}

fn rubric_scores(mapper: &CategoryMapper, inputs: &[DeckScoreInput]) -> Vec<ScoreRecord> {
    let deck: Vec<ScoreRecord> = inputs
        .iter()
        .map(|i| ScoreRecord {
            category: ScoreCategory::Deck(i.category),
            score: deckscope_core::clamp_score(i.score),
            weight: deckscope_core::clamp_weight(i.weight),
            justification: String::new(),
            source_agent: i.category.to_string(),
        })
        .collect();
    mapper.rubric_records(&deck)
}

fn cmd_map(input: &Path, config: Option<&Path>, format: Format) -> Result<()> {
    let config = DeckscopeConfig::load_or_default(config).context("Failed to load config")?;
    let mapper = config.category_mapper()?;
    let inputs: Vec<DeckScoreInput> = read_json_file(input)?;
    let records = rubric_scores(&mapper, &inputs);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => {
            print_scores(&records);
            let unmapped = mapper.unmapped_targets();
            if !unmapped.is_empty() {
                let names: Vec<&str> = unmapped.iter().map(|c| c.as_str()).collect();
                println!("\nUnmapped: {}", names.join(", "));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// run / show / runs
// ---------------------------------------------------------------------------

struct RunArgs {
    pipeline: PipelineKind,
    deck: PathBuf,
    responses: PathBuf,
    fallback: Option<String>,
    document_id: Option<String>,
    company: Option<String>,
    config: Option<PathBuf>,
}

/// Everything persisted for one run.
#[derive(Debug, Serialize)]
struct RunReport {
    run: PipelineRunRecord,
    executions: Vec<ExecutionRecord>,
    scores: Vec<ScoreRecord>,
    findings: Vec<FindingRecord>,
}

async fn open_store(db: Option<&str>) -> Result<Arc<dyn PipelineStore>> {
    let store = match db {
        Some(url) => SurrealPipelineStore::connect(url).await,
        None => SurrealPipelineStore::from_env().await,
    }
    .context("Failed to open deckscope database")?;
    Ok(Arc::new(store))
}

async fn run_offline(store: Arc<dyn PipelineStore>, args: &RunArgs) -> Result<RunReport> {
    let config = DeckscopeConfig::load_or_default(args.config.as_deref())
        .context("Failed to load config")?;

    let text = std::fs::read_to_string(&args.deck)
        .with_context(|| format!("Failed to read deck: {:?}", args.deck))?;
    let document_id = match &args.document_id {
        Some(id) => id.clone(),
        None => args
            .deck
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "deck".to_string()),
    };

    let replies: serde_json::Value = read_json_file(&args.responses)?;
    let mut model = ScriptedModelClient::from_json(&replies)
        .with_context(|| format!("Invalid responses file: {:?}", args.responses))?;
    if let Some(fallback) = &args.fallback {
        model = model.with_fallback(fallback.clone());
    }

    let retriever = TextRetriever::new().with_document(document_id.clone(), &text);
    let definition = PipelineDefinition::standard(
        args.pipeline,
        Arc::new(retriever),
        Arc::new(model),
        &config,
    )?;

    let progress = Arc::new(BroadcastProgress::default());
    let mut events = progress.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(run_id = %event.run_id, "[{:>3}%] {}", event.progress, event.step);
        }
    });

    let orchestrator =
        StageOrchestrator::from_config(store.clone(), &config)?.with_progress(progress);
    let mut context = deckscope_core::AnalysisContext::new(document_id);
    if let Some(company) = &args.company {
        context = context.with_company(company.clone());
    }

    let outcome = orchestrator.run_pipeline(&definition, &context).await;
    orchestrator.metrics().flush();
    drop(orchestrator);
    listener.await.ok();

    let run_id = match outcome {
        Ok(run) => run.run_id,
        Err(deckscope_core::OrchestratorError::StageAborted { run_id, .. })
        | Err(deckscope_core::OrchestratorError::AggregationFailed { run_id, .. }) => {
            RunId(run_id)
        }
        Err(e) => return Err(e).context("Pipeline run failed"),
    };
    load_report(store.as_ref(), &run_id).await
}

async fn load_report(store: &dyn PipelineStore, run_id: &RunId) -> Result<RunReport> {
    let run = store
        .get_run(run_id)
        .await
        .with_context(|| format!("Failed to load run {}", run_id))?;
    Ok(RunReport {
        executions: store.get_executions(run_id).await?,
        scores: store.get_scores(run_id).await?,
        findings: store.get_findings(run_id).await?,
        run,
    })
}

async fn cmd_runs(store: &dyn PipelineStore, pipeline: Option<PipelineKind>) -> Result<()> {
    let runs = store.list_runs(pipeline).await?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<9} {:<9} {:>5}  {}",
            run.run_id,
            run.pipeline.as_str(),
            run.status.as_str(),
            run.overall_score
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            run.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn print_report(report: &RunReport, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let run = &report.run;
    println!("Run:      {}", run.run_id);
    println!("Pipeline: {} ({})", run.pipeline, run.failure_policy);
    println!("Document: {}", run.document_id);
    println!("Status:   {}", run.status);
    match run.overall_score {
        Some(score) => println!("Overall:  {}", score),
        None => println!("Overall:  -"),
    }
    if let Some(err) = &run.error_message {
        println!("Error:    {}", err);
    }

    println!("\nAgents:");
    for e in &report.executions {
        let mark = match e.status {
            ExecutionStatus::Completed => "ok",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Running | ExecutionStatus::Pending => "..",
        };
        print!(
            "  {:>2}. {:<16} {:<6} retries={}",
            e.execution_order, e.agent_name, mark, e.retry_count
        );
        match &e.error_message {
            Some(msg) => println!("  {}", msg),
            None => println!(),
        }
    }

    if !report.scores.is_empty() {
        println!("\nScores:");
        print_scores(&report.scores);
    }
    if !report.findings.is_empty() {
        println!("\nFindings:");
        print_findings(&report.findings);
    }
    Ok(())
}

fn print_scores(scores: &[ScoreRecord]) {
    for s in scores {
        println!(
            "  {:<8} {:<22} {:>5.1}  (weight {:.2})",
            s.category.taxonomy(),
            s.category.name(),
            s.score,
            s.weight
        );
    }
}

fn print_findings(findings: &[FindingRecord]) {
    for f in findings {
        println!(
            "  [{}] {} ({}, from {})",
            f.severity, f.title, f.finding_type, f.source
        );
        println!("      {}", truncate(&f.description, 100));
        for r in &f.recommendations {
            println!("      - {}", r);
        }
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
