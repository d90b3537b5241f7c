//! Merge-time estimation core
//!
//! Turns raw pull request records into model-ready feature vectors whose
//! columns match, exactly and in order, the schema a model was trained on.
//!
//! Modules:
//! - `record`: raw records, typed pull request input, dense matrices
//! - `encoder`: stateless one-hot encoding
//! - `schema`: frozen schema and leakage-safe capture
//! - `align`: per-record schema alignment with diagnostics
//! - `gbdt`: tree-ensemble model format and inference
//! - `facade`: `Regressor` trait (`fit`) and `predict`
//! - `artifacts`: persisted (model, schema) pair with integrity checks
//! - `predictor`: process-wide active model, estimates and buckets

pub mod align;
pub mod artifacts;
pub mod encoder;
pub mod errors;
pub mod facade;
pub mod gbdt;
pub mod predictor;
pub mod record;
pub mod schema;
pub mod serde_canon;

pub use align::{align, Aligned, AlignmentNote, SchemaAligner};
pub use artifacts::{Artifacts, Manifest};
pub use encoder::{CategoricalEncoder, Column, Encoding};
pub use errors::{MergeTimeError, Result};
pub use facade::{predict, MeanRegressor, Regressor};
pub use gbdt::{Model, Node, Tree};
pub use predictor::{estimate, ActiveModel, Bucket, Estimate};
pub use record::{Matrix, PullRequestInput, Record, Value};
pub use schema::{Capture, Schema, SchemaCapture};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fields only observable after a pull request is merged
pub const DEFAULT_LEAKAGE_FIELDS: [&str; 4] =
    ["pr_number", "total_comments", "time_to_merge_hours", "id"];
