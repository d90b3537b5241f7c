//! Error types for the merge-time core

use thiserror::Error;

/// Errors raised while capturing schemas, aligning records or scoring models
#[derive(Error, Debug)]
pub enum MergeTimeError {
    /// No rows were available where at least one is required
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// A persisted artifact (model or schema) could not be found
    #[error("artifact missing: {artifact} not found at {path}")]
    ArtifactMissing { artifact: String, path: String },

    /// A numeric field required by the schema is absent from the record
    #[error("missing field: schema requires numeric field `{field}`")]
    MissingField { field: String },

    /// Matrix width or row count disagrees with what the consumer expects
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A record is malformed (e.g. a field changes kind between records)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration or call parameters are out of range
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Persisted artifact digest does not match the manifest
    #[error("integrity check failed for {artifact}: expected {expected}, got {actual}")]
    Integrity {
        artifact: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MergeTimeError {
    pub(crate) fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

/// Result type for merge-time core operations
pub type Result<T> = std::result::Result<T, MergeTimeError>;
