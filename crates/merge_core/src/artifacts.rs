//! Persisted (model, schema) pair
//!
//! Layout of an artifact directory:
//!
//! - `model.json`    canonical JSON of [`Model`]
//! - `schema.json`   canonical JSON of [`Schema`]
//! - `manifest.json` blake3 digests of both files, schema width, metrics
//!
//! The pair is written and loaded together. Loading either without the
//! other is an [`MergeTimeError::ArtifactMissing`] error.

use crate::errors::{MergeTimeError, Result};
use crate::gbdt::Model;
use crate::schema::Schema;
use crate::serde_canon::{digest_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const MODEL_FILE: &str = "model.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Digests and training summary stored next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub model_hash: String,
    pub schema_hash: String,
    pub schema_width: usize,
    pub created_at: String,
    /// Evaluation metrics recorded at training time
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// A trained model together with the schema it was fit on
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub model: Model,
    pub schema: Schema,
    pub manifest: Manifest,
}

impl Artifacts {
    /// Pair a model with its schema, checking the widths agree
    pub fn new(model: Model, schema: Schema, metrics: BTreeMap<String, f64>) -> Result<Self> {
        check_pairing(&model, &schema)?;
        let manifest = Manifest {
            model_hash: digest_hex(model.to_canonical_json()?.as_bytes()),
            schema_hash: digest_hex(schema_json(&schema)?.as_bytes()),
            schema_width: schema.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
            metrics,
        };
        Ok(Self {
            model,
            schema,
            manifest,
        })
    }

    /// Write all three files into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let model_json = self.model.to_canonical_json()?;
        let schema_json = schema_json(&self.schema)?;
        let manifest_json = serde_json::to_string_pretty(&self.manifest)?;

        fs::write(dir.join(MODEL_FILE), &model_json)?;
        fs::write(dir.join(SCHEMA_FILE), &schema_json)?;
        fs::write(dir.join(MANIFEST_FILE), &manifest_json)?;

        info!(
            dir = %dir.display(),
            model_hash = %self.manifest.model_hash,
            schema_width = self.manifest.schema_width,
            "artifacts saved"
        );
        Ok(())
    }

    /// Load and verify the pair from `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        let schema_path = dir.join(SCHEMA_FILE);
        let manifest_path = dir.join(MANIFEST_FILE);

        for (artifact, path) in [
            ("model", &model_path),
            ("schema", &schema_path),
            ("manifest", &manifest_path),
        ] {
            if !path.is_file() {
                return Err(MergeTimeError::ArtifactMissing {
                    artifact: artifact.to_string(),
                    path: path.display().to_string(),
                });
            }
        }

        let model_json = fs::read_to_string(&model_path)?;
        let schema_json = fs::read_to_string(&schema_path)?;
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;

        verify_digest("model", &manifest.model_hash, &model_json)?;
        verify_digest("schema", &manifest.schema_hash, &schema_json)?;

        let model: Model = serde_json::from_str(&model_json)?;
        model.validate()?;
        let schema: Schema = serde_json::from_str(&schema_json)?;
        schema.validate()?;
        check_pairing(&model, &schema)?;
        if manifest.schema_width != schema.len() {
            return Err(MergeTimeError::ShapeMismatch {
                context: "manifest schema width".into(),
                expected: manifest.schema_width,
                actual: schema.len(),
            });
        }

        debug!(dir = %dir.display(), trees = model.num_trees(), "artifacts loaded");
        Ok(Self {
            model,
            schema,
            manifest,
        })
    }

    /// Whether a complete artifact set exists in `dir`
    pub fn exists(dir: &Path) -> bool {
        [MODEL_FILE, SCHEMA_FILE, MANIFEST_FILE]
            .iter()
            .all(|f| dir.join(f).is_file())
    }
}

fn schema_json(schema: &Schema) -> Result<String> {
    to_canonical_json(schema).map_err(|e| MergeTimeError::InvalidInput(e.to_string()))
}

fn check_pairing(model: &Model, schema: &Schema) -> Result<()> {
    if model.feature_count != schema.len() {
        return Err(MergeTimeError::ShapeMismatch {
            context: "model/schema pairing".into(),
            expected: schema.len(),
            actual: model.feature_count,
        });
    }
    Ok(())
}

fn verify_digest(artifact: &str, expected: &str, contents: &str) -> Result<()> {
    let actual = digest_hex(contents.as_bytes());
    if actual != expected {
        return Err(MergeTimeError::Integrity {
            artifact: artifact.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
