//! Merge-time trainer - deterministic offline GBDT training
//!
//! Loads the raw pull request table, captures a leakage-free schema, splits
//! with a seeded shuffle, fits gradient boosted trees and pairs the model
//! with its schema for persistence.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod pipeline;
pub mod split;
pub mod trainer;

use std::path::Path;

pub use config::{EncodingConfig, SplitConfig, TrainingConfig};
pub use dataset::{Dataset, LoadReport};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{Result, TrainerError};
pub use pipeline::{EvaluationReport, TrainingOutcome};
pub use split::{baseline_error, mean_absolute_error, SplitFractions, SplitHarness};
pub use trainer::{GbdtConfig, GbdtTrainer};

/// Train a GBDT model directly from a CSV file using the provided configuration.
pub fn train_model_from_csv(path: &Path, config: &TrainingConfig) -> Result<TrainingOutcome> {
    let dataset = Dataset::from_csv(path, config.max_hours)?;
    let trainer = GbdtTrainer::new(config.gbdt.clone());
    pipeline::run(&dataset.records, &dataset.labels, config, &trainer)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
