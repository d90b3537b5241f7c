//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Squared-error boosting with exact-greedy CART splits. Training is fully
//! deterministic: the same matrix and labels always produce the same model.

use mergetime_core::facade::check_training_shape;
use mergetime_core::{Matrix, MergeTimeError, Model, Regressor, Result, Tree};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cart::{CartBuilder, TreeConfig};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    /// L2 regularisation on leaf weights
    pub lambda: f64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 4,
            min_samples_leaf: 5,
            learning_rate: 0.1,
            lambda: 1.0,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(MergeTimeError::InvalidParameters(
                "max_depth must be at least 1".into(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(MergeTimeError::InvalidParameters(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(MergeTimeError::InvalidParameters(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            lambda: self.lambda,
        }
    }
}

/// GBDT trainer
#[derive(Clone, Debug, Default)]
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Train a GBDT model on a feature matrix and its labels
    pub fn train(&self, matrix: &Matrix, labels: &[f64]) -> Result<Model> {
        check_training_shape(matrix, labels)?;
        self.config.validate()?;

        let bias = labels.iter().sum::<f64>() / labels.len() as f64;
        let mut predictions = vec![bias; labels.len()];
        let hessians = vec![1.0; labels.len()];
        let tree_config = self.config.tree_config();

        let mut trees = Vec::with_capacity(self.config.num_trees);
        for tree_idx in 0..self.config.num_trees {
            let gradients = calculate_gradients(labels, &predictions);

            let tree = CartBuilder::new(&matrix.rows, &gradients, &hessians, tree_config.clone()).build();
            self.update_predictions(&tree, matrix, &mut predictions);

            debug!(
                tree = tree_idx + 1,
                nodes = tree.nodes.len(),
                depth = tree.depth(),
                "Trained tree"
            );
            trees.push(tree);
        }

        let mut model = Model::new(matrix.width, bias, self.config.learning_rate, trees);
        model.metadata.insert("algorithm".into(), self.name().to_string());
        model
            .metadata
            .insert("num_trees".into(), self.config.num_trees.to_string());
        model
            .metadata
            .insert("max_depth".into(), self.config.max_depth.to_string());
        model.metadata.insert(
            "min_samples_leaf".into(),
            self.config.min_samples_leaf.to_string(),
        );
        model
            .metadata
            .insert("lambda".into(), self.config.lambda.to_string());
        model
            .metadata
            .insert("training_rows".into(), labels.len().to_string());
        Ok(model)
    }

    fn update_predictions(&self, tree: &Tree, matrix: &Matrix, predictions: &mut [f64]) {
        for (pred, row) in predictions.iter_mut().zip(&matrix.rows) {
            *pred += self.config.learning_rate * tree.evaluate(row);
        }
    }
}

impl Regressor for GbdtTrainer {
    fn name(&self) -> &'static str {
        "gbdt"
    }

    fn fit(&self, matrix: &Matrix, labels: &[f64]) -> Result<Model> {
        self.train(matrix, labels)
    }
}

/// Gradients of squared error: prediction - target.
/// The hessian is the constant 1.
fn calculate_gradients(targets: &[f64], predictions: &[f64]) -> Vec<f64> {
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| p - t)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergetime_core::predict;

    fn create_simple_dataset() -> (Matrix, Vec<f64>) {
        let rows = vec![
            vec![1.0, 2.0],
            vec![2.0, 3.0],
            vec![3.0, 4.0],
            vec![4.0, 5.0],
            vec![10.0, 1.0],
            vec![11.0, 0.0],
        ];
        let labels = vec![10.0, 12.0, 11.0, 13.0, 80.0, 82.0];
        (Matrix::from_rows(rows).unwrap(), labels)
    }

    fn small_config() -> GbdtConfig {
        GbdtConfig {
            num_trees: 20,
            max_depth: 2,
            min_samples_leaf: 1,
            learning_rate: 0.3,
            lambda: 1.0,
        }
    }

    #[test]
    fn test_train_simple_model() {
        let (x, y) = create_simple_dataset();
        let model = GbdtTrainer::new(small_config()).train(&x, &y).unwrap();

        assert_eq!(model.num_trees(), 20);
        assert_eq!(model.feature_count, 2);
        assert_eq!(model.metadata.get("algorithm").map(String::as_str), Some("gbdt"));
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_bias_is_label_mean() {
        let (x, y) = create_simple_dataset();
        let config = GbdtConfig {
            num_trees: 0,
            ..small_config()
        };
        let model = GbdtTrainer::new(config).train(&x, &y).unwrap();
        assert!((model.bias - 208.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let (x, y) = create_simple_dataset();
        let model = GbdtTrainer::new(small_config()).fit(&x, &y).unwrap();
        let preds = predict(&model, &x).unwrap();

        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let baseline: f64 = y.iter().map(|v| (v - mean).abs()).sum();
        let fitted: f64 = y.iter().zip(&preds).map(|(v, p)| (v - p).abs()).sum();
        assert!(fitted < baseline / 2.0);
    }

    #[test]
    fn test_determinism() {
        let (x, y) = create_simple_dataset();
        let trainer = GbdtTrainer::new(small_config());
        let model1 = trainer.train(&x, &y).unwrap();
        let model2 = trainer.train(&x, &y).unwrap();

        assert_eq!(model1, model2);
        assert_eq!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let (x, y) = create_simple_dataset();
        let config = GbdtConfig {
            learning_rate: 0.0,
            ..small_config()
        };
        assert!(matches!(
            GbdtTrainer::new(config).train(&x, &y),
            Err(MergeTimeError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_rejects_label_mismatch() {
        let (x, _) = create_simple_dataset();
        assert!(matches!(
            GbdtTrainer::default().train(&x, &[1.0]),
            Err(MergeTimeError::ShapeMismatch { .. })
        ));
    }
}
