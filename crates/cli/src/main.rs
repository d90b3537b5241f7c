//! Merge-time estimation command line interface
//!
//! Scores a pending pull request against a trained artifact pair and
//! inspects the schema a model was trained on.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mergetime_core::{ActiveModel, Artifacts, Estimate, MergeTimeError, PullRequestInput, Record};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServeConfig;

#[derive(Parser)]
#[command(name = "mergetime")]
#[command(about = "Estimate how long a pull request will take to merge", long_about = None)]
#[command(version)]
struct Cli {
    /// Artifact directory (overrides configuration)
    #[arg(long, global = true, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate merge time for one pull request
    Predict(PredictCommand),
    /// Show the feature schema of the trained model
    Inspect,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct PredictCommand {
    /// Raw record as a JSON object, or @path to a JSON file
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with_all = [
            "additions",
            "deletions",
            "changed_files",
            "num_commits",
            "draft",
            "title_len",
            "body_len",
            "num_labels",
            "author_assoc",
            "repo",
        ]
    )]
    record: Option<String>,

    #[arg(long, default_value_t = 50)]
    additions: u64,
    #[arg(long, default_value_t = 10)]
    deletions: u64,
    #[arg(long, default_value_t = 2)]
    changed_files: u64,
    #[arg(long, default_value_t = 1)]
    num_commits: u64,
    /// Mark the pull request as a draft
    #[arg(long)]
    draft: bool,
    #[arg(long, default_value_t = 50)]
    title_len: u64,
    #[arg(long, default_value_t = 500)]
    body_len: u64,
    #[arg(long, default_value_t = 1)]
    num_labels: u64,
    /// Author association (MEMBER, CONTRIBUTOR, NONE, ...)
    #[arg(long, default_value = "CONTRIBUTOR")]
    author_assoc: String,
    /// Repository as owner/name
    #[arg(long, default_value = "microsoft/vscode")]
    repo: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl PredictCommand {
    fn input(&self) -> PullRequestInput {
        PullRequestInput {
            additions: self.additions,
            deletions: self.deletions,
            changed_files: self.changed_files,
            num_commits: self.num_commits,
            is_draft: self.draft,
            title_len: self.title_len,
            body_len: self.body_len,
            num_labels: self.num_labels,
            author_assoc: self.author_assoc.clone(),
            repo: self.repo.clone(),
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut serve = ServeConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.artifacts {
        serve.artifact_dir = dir;
    }
    init_logging(&serve.log_level)?;

    let active = load_active(&serve.artifact_dir)?;

    match cli.command {
        Commands::Predict(cmd) => handle_predict(&active, cmd),
        Commands::Inspect => handle_inspect(&active),
    }
}

fn load_active(dir: &Path) -> Result<ActiveModel> {
    debug!(dir = %dir.display(), "Loading artifacts");
    match ActiveModel::load(dir) {
        Ok(active) => {
            let artifacts = active.current()?;
            info!(
                dir = %dir.display(),
                model_hash = %artifacts.manifest.model_hash,
                features = artifacts.schema.len(),
                "Loaded model artifacts"
            );
            Ok(active)
        }
        Err(err @ MergeTimeError::ArtifactMissing { .. }) => Err(anyhow::anyhow!(
            "{}\nNo estimate produced. Train a model first: mergetime-train --input <prs.csv> --output {}",
            err,
            dir.display()
        )),
        Err(err) => Err(err).with_context(|| format!("Failed to load artifacts from {}", dir.display())),
    }
}

fn parse_record(raw: &str) -> Result<Record> {
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?,
        None => raw.to_string(),
    };
    let json: serde_json::Value = serde_json::from_str(&text).context("Record is not valid JSON")?;
    Ok(Record::from_json(&json)?)
}

fn handle_predict(active: &ActiveModel, cmd: PredictCommand) -> Result<()> {
    let estimate = match &cmd.record {
        Some(raw) => {
            let record = parse_record(raw)?;
            debug!(fields = record.len(), "Scoring raw record");
            active.predict(&record)?
        }
        None => active.predict_input(cmd.input())?,
    };
    info!(
        hours = estimate.hours,
        bucket = %estimate.bucket,
        notes = estimate.notes.len(),
        "Estimated merge time"
    );

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimate)?),
        OutputFormat::Text => print_estimate(&estimate),
    }
    Ok(())
}

fn print_estimate(estimate: &Estimate) {
    println!("Estimated time to merge: {:.1} hours", estimate.hours);
    println!("Category: {}", estimate.bucket);
    println!("{}", estimate.bucket.message());
    for note in &estimate.notes {
        println!("note: {}", note);
    }
}

fn handle_inspect(active: &ActiveModel) -> Result<()> {
    let artifacts = active.current()?;
    print!("{}", describe(&artifacts));
    Ok(())
}

fn describe(artifacts: &Artifacts) -> String {
    let schema = &artifacts.schema;
    let mut out = String::new();
    out.push_str(&format!(
        "Model: {} trees, {} features, hash {}\n",
        artifacts.model.num_trees(),
        artifacts.model.feature_count,
        artifacts.manifest.model_hash
    ));
    out.push_str(&format!("Trained: {}\n", artifacts.manifest.created_at));
    for (name, value) in &artifacts.manifest.metrics {
        out.push_str(&format!("  {}: {}\n", name, value));
    }
    out.push_str(&format!(
        "Columns ({}, drop_first = {}):\n",
        schema.len(),
        schema.drop_first()
    ));
    for (idx, column) in schema.columns().iter().enumerate() {
        out.push_str(&format!("  {:>3}  {}\n", idx, column));
    }
    for field in schema.categorical_fields() {
        let levels = schema.vocabulary(field).unwrap_or_default();
        let reference = schema.reference_level(field).unwrap_or("-");
        out.push_str(&format!(
            "Vocabulary `{}` ({} levels, reference {}): {}\n",
            field,
            levels.len(),
            reference,
            levels.join(", ")
        ));
    }
    out
}
