//! Seeded train / validation / test partitioning and baseline error
//!
//! The split is two sequential shuffle-splits, each drawing a fresh
//! permutation from an [`LcgRng`] seeded with the same seed: first the test
//! share is carved out of the full index set, then the remainder is divided
//! into validation and train using the renormalised validation share.

use crate::deterministic::LcgRng;
use mergetime_core::{Matrix, MergeTimeError};
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, MergeTimeError>;

/// Allowed deviation of the fraction sum from 1
pub const FRACTION_TOLERANCE: f64 = 1e-6;

// absorbs representation error such as 100 * 0.15 = 15.000000000000002
const CEIL_EPSILON: f64 = 1e-9;

/// Proportions of the three subsets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self {
            train: 0.70,
            validation: 0.15,
            test: 0.15,
        }
    }
}

impl SplitFractions {
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self> {
        let fractions = Self {
            train,
            validation,
            test,
        };
        fractions.validate()?;
        Ok(fractions)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("train", self.train),
            ("validation", self.validation),
            ("test", self.test),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(MergeTimeError::InvalidParameters(format!(
                    "{} fraction {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        let sum = self.train + self.validation + self.test;
        if (sum - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(MergeTimeError::InvalidParameters(format!(
                "split fractions sum to {}, expected 1",
                sum
            )));
        }
        Ok(())
    }

    /// Validation share of what remains after the test split
    pub fn renormalized_validation(&self) -> f64 {
        let remainder = self.train + self.validation;
        if remainder <= 0.0 {
            0.0
        } else {
            self.validation / remainder
        }
    }
}

/// Row indices of each subset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Feature rows and labels of one subset
#[derive(Debug, Clone)]
pub struct Subset {
    pub matrix: Matrix,
    pub labels: Vec<f64>,
}

impl Subset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The three materialised subsets
#[derive(Debug, Clone)]
pub struct SplitData {
    pub indices: SplitIndices,
    pub train: Subset,
    pub validation: Subset,
    pub test: Subset,
}

/// Seeded partitioner
#[derive(Debug, Clone, Copy)]
pub struct SplitHarness {
    fractions: SplitFractions,
    seed: i64,
}

impl SplitHarness {
    pub fn new(fractions: SplitFractions, seed: i64) -> Result<Self> {
        fractions.validate()?;
        Ok(Self { fractions, seed })
    }

    pub fn fractions(&self) -> SplitFractions {
        self.fractions
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    /// Partition `0..n`
    pub fn split(&self, n: usize) -> SplitIndices {
        let n_test = share(n, self.fractions.test);
        let first = LcgRng::new(self.seed).permutation(n);
        let (test, rest) = first.split_at(n_test);

        let n_val = share(rest.len(), self.fractions.renormalized_validation());
        let second = LcgRng::new(self.seed).permutation(rest.len());
        let (val_pos, train_pos) = second.split_at(n_val);

        SplitIndices {
            train: train_pos.iter().map(|&j| rest[j]).collect(),
            validation: val_pos.iter().map(|&j| rest[j]).collect(),
            test: test.to_vec(),
        }
    }

    /// Partition a matrix and its labels
    pub fn split_data(&self, matrix: &Matrix, labels: &[f64]) -> Result<SplitData> {
        if matrix.len() != labels.len() {
            return Err(MergeTimeError::ShapeMismatch {
                context: "labels for split".into(),
                expected: matrix.len(),
                actual: labels.len(),
            });
        }
        let indices = self.split(matrix.len());
        let subset = |rows: &[usize]| Subset {
            matrix: matrix.select_rows(rows),
            labels: rows.iter().map(|&i| labels[i]).collect(),
        };
        Ok(SplitData {
            train: subset(&indices.train),
            validation: subset(&indices.validation),
            test: subset(&indices.test),
            indices,
        })
    }
}

fn share(n: usize, fraction: f64) -> usize {
    let raw = (n as f64 * fraction - CEIL_EPSILON).ceil();
    (raw.max(0.0) as usize).min(n)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute deviation of `eval_labels` from the mean of `train_labels`.
///
/// Centred on the training mean, never the evaluation mean.
pub fn baseline_error(train_labels: &[f64], eval_labels: &[f64]) -> Result<f64> {
    if train_labels.is_empty() {
        return Err(MergeTimeError::EmptyDataset(
            "baseline needs at least one training label".into(),
        ));
    }
    if eval_labels.is_empty() {
        return Err(MergeTimeError::EmptyDataset(
            "baseline needs at least one evaluation label".into(),
        ));
    }
    let centre = mean(train_labels);
    Ok(eval_labels.iter().map(|y| (y - centre).abs()).sum::<f64>() / eval_labels.len() as f64)
}

/// Mean absolute error between labels and predictions
pub fn mean_absolute_error(labels: &[f64], predictions: &[f64]) -> Result<f64> {
    if labels.len() != predictions.len() {
        return Err(MergeTimeError::ShapeMismatch {
            context: "predictions for MAE".into(),
            expected: labels.len(),
            actual: predictions.len(),
        });
    }
    if labels.is_empty() {
        return Err(MergeTimeError::EmptyDataset(
            "mean absolute error of zero labels".into(),
        ));
    }
    Ok(labels
        .iter()
        .zip(predictions)
        .map(|(y, p)| (y - p).abs())
        .sum::<f64>()
        / labels.len() as f64)
}
