//! Gradient boosted regression model
//!
//! Prediction is `bias + learning_rate * sum(tree outputs)`. The model
//! remembers the width it was fit on and refuses any other.

use super::tree::Tree;
use crate::errors::{MergeTimeError, Result};
use crate::record::Matrix;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Model format version
pub const MODEL_VERSION: i32 = 1;

/// Gradient boosted tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version (always 1 for now)
    pub version: i32,

    /// Number of features the model was fit on
    pub feature_count: usize,

    /// Mean of the training labels
    pub bias: f64,

    /// Shrinkage applied to each tree's output
    pub learning_rate: f64,

    pub trees: Vec<Tree>,

    /// Free-form training metadata (algorithm parameters, sample count)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Model {
    pub fn new(feature_count: usize, bias: f64, learning_rate: f64, trees: Vec<Tree>) -> Self {
        Self {
            version: MODEL_VERSION,
            feature_count,
            bias,
            learning_rate,
            trees,
            metadata: BTreeMap::new(),
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(MergeTimeError::InvalidInput(format!(
                "unsupported model version: {}",
                self.version
            )));
        }
        if !self.bias.is_finite() || !self.learning_rate.is_finite() {
            return Err(MergeTimeError::InvalidInput(
                "model bias and learning rate must be finite".into(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                MergeTimeError::InvalidInput(format!("tree {} validation failed: {}", i, e))
            })?;
        }
        Ok(())
    }

    /// Score one feature vector
    pub fn predict_row(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count {
            return Err(MergeTimeError::shape(
                "model input width",
                self.feature_count,
                features.len(),
            ));
        }
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        Ok(self.bias + self.learning_rate * sum)
    }

    /// Score every row of a matrix
    pub fn predict(&self, matrix: &Matrix) -> Result<Vec<f64>> {
        if matrix.width != self.feature_count {
            return Err(MergeTimeError::shape(
                "model input width",
                self.feature_count,
                matrix.width,
            ));
        }
        matrix.rows.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        to_canonical_json(self).map_err(|e| MergeTimeError::InvalidInput(e.to_string()))
    }

    /// Blake3 digest of the canonical JSON form
    pub fn hash_hex(&self) -> Result<String> {
        hash_canonical_hex(self).map_err(|e| MergeTimeError::InvalidInput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, 10.0),
            Node::leaf(2, 20.0),
        ]);
        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 0.5, 1, 2),
            Node::leaf(1, -4.0),
            Node::leaf(2, 4.0),
        ]);
        Model::new(2, 30.0, 0.5, vec![tree1, tree2])
    }

    #[test]
    fn test_model_inference() {
        let model = create_test_model();
        // tree1 -> 10, tree2 -> 4 ; 30 + 0.5 * 14
        assert_eq!(model.predict_row(&[30.0, 1.0]).unwrap(), 37.0);
        // tree1 -> 20, tree2 -> -4 ; 30 + 0.5 * 16
        assert_eq!(model.predict_row(&[60.0, 0.0]).unwrap(), 38.0);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let model = create_test_model();
        let err = model.predict_row(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            MergeTimeError::ShapeMismatch { expected: 2, actual: 3, .. }
        ));

        let matrix = Matrix::from_rows(vec![vec![1.0]]).unwrap();
        assert!(model.predict(&matrix).is_err());
    }

    #[test]
    fn test_batch_matches_rows() {
        let model = create_test_model();
        let matrix = Matrix::from_rows(vec![vec![30.0, 1.0], vec![60.0, 0.0]]).unwrap();
        assert_eq!(model.predict(&matrix).unwrap(), vec![37.0, 38.0]);
    }

    #[test]
    fn test_empty_ensemble_predicts_bias() {
        let model = Model::new(3, 12.5, 0.1, Vec::new());
        assert_eq!(model.predict_row(&[0.0, 0.0, 0.0]).unwrap(), 12.5);
    }

    #[test]
    fn test_canonical_json_roundtrip() {
        let model = create_test_model();
        let json = model.to_canonical_json().unwrap();
        let restored: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(model, restored);
        assert_eq!(model.hash_hex().unwrap(), restored.hash_hex().unwrap());
    }

    #[test]
    fn test_model_validation() {
        assert!(create_test_model().validate().is_ok());

        let mut invalid = create_test_model();
        invalid.feature_count = 1;
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate().is_err());
    }
}
