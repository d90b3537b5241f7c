//! `fit` / `predict` seam over the regression algorithm

use crate::errors::{MergeTimeError, Result};
use crate::gbdt::Model;
use crate::record::Matrix;

/// A regression algorithm that produces a persisted tree-ensemble [`Model`].
///
/// Implementations must be deterministic: the same matrix and labels always
/// produce the same model.
pub trait Regressor {
    /// Short algorithm name recorded in model metadata
    fn name(&self) -> &'static str;

    fn fit(&self, matrix: &Matrix, labels: &[f64]) -> Result<Model>;
}

/// Score a matrix with a fitted model
pub fn predict(model: &Model, matrix: &Matrix) -> Result<Vec<f64>> {
    model.predict(matrix)
}

/// Shared preconditions for [`Regressor::fit`]
pub fn check_training_shape(matrix: &Matrix, labels: &[f64]) -> Result<()> {
    if matrix.is_empty() {
        return Err(MergeTimeError::EmptyDataset(
            "cannot fit a model on zero rows".into(),
        ));
    }
    if matrix.len() != labels.len() {
        return Err(MergeTimeError::ShapeMismatch {
            context: "label count".into(),
            expected: matrix.len(),
            actual: labels.len(),
        });
    }
    if let Some(row) = matrix.rows.iter().find(|r| r.len() != matrix.width) {
        return Err(MergeTimeError::ShapeMismatch {
            context: "training row width".into(),
            expected: matrix.width,
            actual: row.len(),
        });
    }
    if labels.iter().any(|y| !y.is_finite()) {
        return Err(MergeTimeError::InvalidInput(
            "training labels must be finite".into(),
        ));
    }
    Ok(())
}

/// Predicts the training-label mean for every row
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanRegressor;

impl Regressor for MeanRegressor {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn fit(&self, matrix: &Matrix, labels: &[f64]) -> Result<Model> {
        check_training_shape(matrix, labels)?;
        let mean = labels.iter().sum::<f64>() / labels.len() as f64;
        let mut model = Model::new(matrix.width, mean, 1.0, Vec::new());
        model
            .metadata
            .insert("algorithm".into(), self.name().to_string());
        Ok(model)
    }
}
