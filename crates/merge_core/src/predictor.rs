//! Process-wide model state and the inference path
//!
//! [`ActiveModel`] holds the loaded artifact pair. It is loaded once, never
//! mutated, and replaced wholesale only by an explicit [`ActiveModel::reload`].
//! Requests take an `Arc` snapshot and run alignment and prediction without
//! holding any lock.

use crate::align::{align, AlignmentNote};
use crate::artifacts::Artifacts;
use crate::errors::{MergeTimeError, Result};
use crate::record::{PullRequestInput, Record};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Estimates below this many hours are fast
pub const FAST_THRESHOLD_HOURS: f64 = 24.0;
/// Estimates at or above this many hours are complex
pub const COMPLEX_THRESHOLD_HOURS: f64 = 72.0;

/// Coarse merge-time category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Fast,
    Standard,
    Complex,
}

impl Bucket {
    pub fn from_hours(hours: f64) -> Self {
        if hours < FAST_THRESHOLD_HOURS {
            Bucket::Fast
        } else if hours < COMPLEX_THRESHOLD_HOURS {
            Bucket::Standard
        } else {
            Bucket::Complex
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Bucket::Fast => "Fast track: likely to be merged within a single day.",
            Bucket::Standard => "Standard review: expect a merge within 2-3 business days.",
            Bucket::Complex => "Complex change: may require significant review time (3+ days).",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bucket::Fast => "fast",
            Bucket::Standard => "standard",
            Bucket::Complex => "complex",
        })
    }
}

/// Result of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub hours: f64,
    pub bucket: Bucket,
    /// Alignment diagnostics, e.g. unseen categories
    pub notes: Vec<AlignmentNote>,
}

/// Align and score one record against a loaded artifact pair
pub fn estimate(artifacts: &Artifacts, record: &Record) -> Result<Estimate> {
    let aligned = align(record, &artifacts.schema)?;
    let hours = artifacts.model.predict_row(&aligned.features)?;
    debug!(hours, notes = aligned.notes.len(), "record scored");
    Ok(Estimate {
        hours,
        bucket: Bucket::from_hours(hours),
        notes: aligned.notes,
    })
}

/// Shared handle to the artifact pair used for serving
#[derive(Debug, Default)]
pub struct ActiveModel {
    inner: RwLock<Option<Loaded>>,
}

#[derive(Debug, Clone)]
struct Loaded {
    dir: PathBuf,
    artifacts: Arc<Artifacts>,
}

impl ActiveModel {
    /// Empty handle; every request fails with `ArtifactMissing` until loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `dir` into a fresh handle
    pub fn load(dir: &Path) -> Result<Self> {
        let active = Self::new();
        active.reload(dir)?;
        Ok(active)
    }

    /// Wrap an in-memory pair (tests, freshly trained models)
    pub fn from_artifacts(artifacts: Artifacts) -> Self {
        Self {
            inner: RwLock::new(Some(Loaded {
                dir: PathBuf::new(),
                artifacts: Arc::new(artifacts),
            })),
        }
    }

    /// Replace the served pair after a retrain. On failure the previous pair
    /// keeps serving.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn reload(&self, dir: &Path) -> Result<()> {
        let artifacts = Artifacts::load(dir)?;
        info!(
            model_hash = %artifacts.manifest.model_hash,
            width = artifacts.schema.len(),
            "active model loaded"
        );
        *self.inner.write() = Some(Loaded {
            dir: dir.to_path_buf(),
            artifacts: Arc::new(artifacts),
        });
        Ok(())
    }

    /// Read-only snapshot of the served pair
    pub fn current(&self) -> Result<Arc<Artifacts>> {
        self.inner
            .read()
            .as_ref()
            .map(|l| Arc::clone(&l.artifacts))
            .ok_or_else(|| MergeTimeError::ArtifactMissing {
                artifact: "model and schema".into(),
                path: "<not loaded>".into(),
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }

    pub fn source_dir(&self) -> Option<PathBuf> {
        self.inner.read().as_ref().map(|l| l.dir.clone())
    }

    pub fn predict(&self, record: &Record) -> Result<Estimate> {
        let artifacts = self.current()?;
        estimate(&artifacts, record)
    }

    /// Validate a typed input, then predict
    pub fn predict_input(&self, input: PullRequestInput) -> Result<Estimate> {
        let artifacts = self.current()?;
        let record = input.into_record()?;
        estimate(&artifacts, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Column;
    use crate::gbdt::{Model, Node, Tree};
    use crate::schema::Schema;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn artifacts(bias: f64) -> Artifacts {
        let mut vocabulary = BTreeMap::new();
        vocabulary.insert(
            "repo".to_string(),
            vec!["excalidraw".to_string(), "vscode".to_string()],
        );
        let schema = Schema::new(
            vec![Column::numeric("additions"), Column::indicator("repo", "vscode")],
            vocabulary,
            true,
        )
        .unwrap();
        let tree = Tree::new(vec![
            Node::internal(0, 0, 100.0, 1, 2),
            Node::leaf(1, 0.0),
            Node::leaf(2, 60.0),
        ]);
        let model = Model::new(2, bias, 1.0, vec![tree]);
        Artifacts::new(model, schema, BTreeMap::new()).unwrap()
    }

    #[test]
    fn bucket_thresholds() {
        assert_eq!(Bucket::from_hours(0.0), Bucket::Fast);
        assert_eq!(Bucket::from_hours(23.9), Bucket::Fast);
        assert_eq!(Bucket::from_hours(24.0), Bucket::Standard);
        assert_eq!(Bucket::from_hours(71.9), Bucket::Standard);
        assert_eq!(Bucket::from_hours(72.0), Bucket::Complex);
        assert_eq!(Bucket::from_hours(300.0), Bucket::Complex);
    }

    #[test]
    fn unloaded_model_refuses() {
        let active = ActiveModel::new();
        let record = Record::new().with("additions", 1.0);
        assert!(matches!(
            active.predict(&record),
            Err(MergeTimeError::ArtifactMissing { .. })
        ));
        assert!(!active.is_loaded());
    }

    #[test]
    fn predicts_with_bucket_and_notes() {
        let active = ActiveModel::from_artifacts(artifacts(12.0));
        let record = Record::new()
            .with("additions", 500.0)
            .with("repo", "unknown/repo");
        let estimate = active.predict(&record).unwrap();
        assert_eq!(estimate.hours, 72.0);
        assert_eq!(estimate.bucket, Bucket::Complex);
        assert_eq!(estimate.notes.len(), 1);
    }

    #[test]
    fn missing_field_yields_no_estimate() {
        let active = ActiveModel::from_artifacts(artifacts(12.0));
        let record = Record::new().with("repo", "vscode");
        assert!(matches!(
            active.predict(&record),
            Err(MergeTimeError::MissingField { .. })
        ));
    }

    #[test]
    fn reload_swaps_snapshot_and_keeps_old_on_failure() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        artifacts(1.0).save(first.path()).unwrap();
        artifacts(2.0).save(second.path()).unwrap();

        let active = ActiveModel::load(first.path()).unwrap();
        let before = active.current().unwrap();
        assert_eq!(before.model.bias, 1.0);

        active.reload(second.path()).unwrap();
        assert_eq!(active.current().unwrap().model.bias, 2.0);
        // snapshots taken earlier are unaffected
        assert_eq!(before.model.bias, 1.0);

        let empty = TempDir::new().unwrap();
        assert!(active.reload(empty.path()).is_err());
        assert_eq!(active.current().unwrap().model.bias, 2.0);
        assert_eq!(active.source_dir(), Some(second.path().to_path_buf()));
    }
}
