//! End-to-end training: capture the schema, split, fit, evaluate and pair
//! the model with its schema.

use mergetime_core::{Artifacts, Capture, Record, Regressor, SchemaCapture};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::errors::{Result, TrainerError};
use crate::split::{baseline_error, mean_absolute_error, Subset};

/// Held-out error of a trained model next to the mean-predictor baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
    pub validation_mae: Option<f64>,
    pub validation_baseline_mae: Option<f64>,
    pub test_mae: Option<f64>,
    pub test_baseline_mae: Option<f64>,
}

impl EvaluationReport {
    /// Whether the model beats the mean predictor on validation rows
    pub fn beats_baseline(&self) -> Option<bool> {
        match (self.validation_mae, self.validation_baseline_mae) {
            (Some(model), Some(baseline)) => Some(model < baseline),
            _ => None,
        }
    }

    /// Flattened metrics for the artifact manifest
    pub fn to_metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("train_rows".to_string(), self.train_rows as f64);
        metrics.insert("validation_rows".to_string(), self.validation_rows as f64);
        metrics.insert("test_rows".to_string(), self.test_rows as f64);
        let optional = [
            ("validation_mae", self.validation_mae),
            ("validation_baseline_mae", self.validation_baseline_mae),
            ("test_mae", self.test_mae),
            ("test_baseline_mae", self.test_baseline_mae),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                metrics.insert(name.to_string(), value);
            }
        }
        metrics
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifacts: Artifacts,
    pub report: EvaluationReport,
    pub unmatched_leakage: Vec<String>,
}

/// Train on `records` / `labels` with the given algorithm
pub fn run<R: Regressor>(
    records: &[Record],
    labels: &[f64],
    config: &TrainingConfig,
    regressor: &R,
) -> Result<TrainingOutcome> {
    if records.len() != labels.len() {
        return Err(TrainerError::Dataset(format!(
            "{} records but {} labels",
            records.len(),
            labels.len()
        )));
    }

    let capture = SchemaCapture::new(config.encoding.encoder(), config.leakage_fields.iter().cloned());
    let Capture {
        matrix,
        schema,
        unmatched_leakage,
    } = capture.capture(records)?;
    info!(
        columns = schema.len(),
        drop_first = schema.drop_first(),
        "Captured feature schema"
    );

    let harness = config.split.harness()?;
    let split = harness.split_data(&matrix, labels)?;
    info!(
        train = split.train.len(),
        validation = split.validation.len(),
        test = split.test.len(),
        seed = harness.seed(),
        "Split dataset"
    );

    if split.train.is_empty() {
        return Err(TrainerError::Training(
            "training subset is empty; add rows or raise train_frac".into(),
        ));
    }

    let model = regressor.fit(&split.train.matrix, &split.train.labels)?;
    info!(
        algorithm = regressor.name(),
        trees = model.num_trees(),
        bias = model.bias,
        "Fitted model"
    );

    let evaluate = |subset: &Subset| -> Result<(Option<f64>, Option<f64>)> {
        if subset.is_empty() {
            return Ok((None, None));
        }
        let predictions = model.predict(&subset.matrix)?;
        let mae = mean_absolute_error(&subset.labels, &predictions)?;
        let baseline = baseline_error(&split.train.labels, &subset.labels)?;
        Ok((Some(mae), Some(baseline)))
    };
    let (validation_mae, validation_baseline_mae) = evaluate(&split.validation)?;
    let (test_mae, test_baseline_mae) = evaluate(&split.test)?;

    let report = EvaluationReport {
        train_rows: split.train.len(),
        validation_rows: split.validation.len(),
        test_rows: split.test.len(),
        validation_mae,
        validation_baseline_mae,
        test_mae,
        test_baseline_mae,
    };

    match report.beats_baseline() {
        Some(true) => info!(?validation_mae, ?validation_baseline_mae, "Model beats baseline"),
        Some(false) => warn!(?validation_mae, ?validation_baseline_mae, "Model does not beat baseline"),
        None => warn!("No validation rows; baseline comparison skipped"),
    }

    let artifacts = Artifacts::new(model, schema, report.to_metrics())?;

    Ok(TrainingOutcome {
        artifacts,
        report,
        unmatched_leakage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::{GbdtConfig, GbdtTrainer};
    use mergetime_core::{Column, MeanRegressor};

    fn records(n: usize) -> (Vec<Record>, Vec<f64>) {
        let mut records = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let repo = if i % 5 < 3 { "microsoft/vscode" } else { "excalidraw/excalidraw" };
            let additions = (i * 7 % 400) as f64;
            records.push(
                Record::new()
                    .with("repo", repo)
                    .with("pr_number", i as f64)
                    .with("additions", additions)
                    .with("total_comments", (i % 9) as f64),
            );
            labels.push(additions / 10.0 + if repo == "microsoft/vscode" { 5.0 } else { 30.0 });
        }
        (records, labels)
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            gbdt: GbdtConfig {
                num_trees: 30,
                max_depth: 3,
                min_samples_leaf: 2,
                learning_rate: 0.2,
                lambda: 1.0,
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn leakage_never_reaches_schema() {
        let (records, labels) = records(60);
        let outcome = run(&records, &labels, &config(), &MeanRegressor).unwrap();
        let schema = &outcome.artifacts.schema;
        assert_eq!(
            schema.columns(),
            &[Column::numeric("additions"), Column::indicator("repo", "microsoft/vscode")]
        );
        assert!(outcome.unmatched_leakage.is_empty());
    }

    #[test]
    fn report_sizes_and_metrics() {
        let (records, labels) = records(100);
        let outcome = run(&records, &labels, &config(), &GbdtTrainer::new(config().gbdt)).unwrap();
        let report = &outcome.report;
        assert_eq!((report.train_rows, report.validation_rows, report.test_rows), (70, 15, 15));
        assert_eq!(report.beats_baseline(), Some(true));

        let metrics = &outcome.artifacts.manifest.metrics;
        assert_eq!(metrics.get("test_rows"), Some(&15.0));
        assert!(metrics.contains_key("validation_baseline_mae"));
    }

    #[test]
    fn training_is_reproducible() {
        let (records, labels) = records(80);
        let trainer = GbdtTrainer::new(config().gbdt);
        let a = run(&records, &labels, &config(), &trainer).unwrap();
        let b = run(&records, &labels, &config(), &trainer).unwrap();
        assert_eq!(a.artifacts.manifest.model_hash, b.artifacts.manifest.model_hash);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn mismatched_labels_rejected() {
        let (records, _) = records(10);
        assert!(matches!(
            run(&records, &[1.0], &config(), &MeanRegressor),
            Err(TrainerError::Dataset(_))
        ));
    }
}
