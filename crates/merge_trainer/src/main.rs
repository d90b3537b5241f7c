//! Merge-time GBDT trainer CLI
//!
//! Deterministic offline trainer producing a persisted (model, schema) pair.

use anyhow::{Context, Result};
use clap::Parser;
use mergetime_trainer::{pipeline, Dataset, GbdtTrainer, TrainingConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mergetime-train")]
#[command(author = "MergeTime Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train a pull request merge-time model", long_about = None)]
struct Args {
    /// Raw pull request CSV (header row required)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for model, schema and manifest
    #[arg(short, long, default_value = "models/merge_time")]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the split seed
    #[arg(long)]
    seed: Option<i64>,

    /// Override the number of boosting trees
    #[arg(long)]
    trees: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("MergeTime Trainer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = TrainingConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(seed) = args.seed {
        config.split.seed = seed;
    }
    if let Some(trees) = args.trees {
        config.gbdt.num_trees = trees;
    }

    info!("Training configuration:");
    info!(
        "  Split: {:.2}/{:.2}/{:.2} (seed {})",
        config.split.train_frac, config.split.validation_frac, config.split.test_frac, config.split.seed
    );
    info!("  Drop first level: {}", config.encoding.drop_first);
    info!("  Leakage fields: {}", config.leakage_fields.join(", "));
    info!("  Outlier ceiling: {} hours", config.max_hours);
    info!(
        "  Trees: {}, max depth: {}, min samples per leaf: {}, learning rate: {}",
        config.gbdt.num_trees, config.gbdt.max_depth, config.gbdt.min_samples_leaf, config.gbdt.learning_rate
    );

    info!("Loading dataset from: {}", args.input.display());
    let dataset = Dataset::from_csv(&args.input, config.max_hours).context("Failed to load dataset")?;
    if let Some((min, mean, max)) = dataset.label_stats() {
        info!("Merge time (hours): min={:.2}, mean={:.2}, max={:.2}", min, mean, max);
    }

    let trainer = GbdtTrainer::new(config.gbdt.clone());
    let outcome = pipeline::run(&dataset.records, &dataset.labels, &config, &trainer)
        .context("Training failed")?;

    let report = &outcome.report;
    info!("Evaluation:");
    info!(
        "  Rows: train={}, validation={}, test={}",
        report.train_rows, report.validation_rows, report.test_rows
    );
    if let (Some(mae), Some(baseline)) = (report.validation_mae, report.validation_baseline_mae) {
        info!("  Validation MAE: {:.2} hours (baseline {:.2})", mae, baseline);
    }
    if let (Some(mae), Some(baseline)) = (report.test_mae, report.test_baseline_mae) {
        info!("  Test MAE: {:.2} hours (baseline {:.2})", mae, baseline);
    }
    if report.beats_baseline() == Some(false) {
        warn!("Model does not beat the mean-predictor baseline on validation data");
    }

    outcome
        .artifacts
        .save(&args.output)
        .with_context(|| format!("Failed to write artifacts to {}", args.output.display()))?;

    info!("✓ Training completed successfully");
    info!("  Output: {}", args.output.display());
    info!("  Features: {}", outcome.artifacts.schema.len());
    info!("  Model hash: {}", outcome.artifacts.manifest.model_hash);

    Ok(())
}
