//! Frozen feature schema and its capture from a training batch

use crate::encoder::{CategoricalEncoder, Column};
use crate::errors::{MergeTimeError, Result};
use crate::record::{Matrix, Record};
use crate::serde_canon::hash_canonical_hex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Schema format version
pub const SCHEMA_VERSION: u32 = 1;

/// Ordered column list a model was fit on, plus the training vocabulary of
/// every categorical field that feeds it.
///
/// Immutable once built; there are no mutators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    version: u32,
    columns: Vec<Column>,
    vocabulary: BTreeMap<String, Vec<String>>,
    drop_first: bool,
}

impl Schema {
    pub fn new(
        columns: Vec<Column>,
        vocabulary: BTreeMap<String, Vec<String>>,
        drop_first: bool,
    ) -> Result<Self> {
        let schema = Self {
            version: SCHEMA_VERSION,
            columns,
            vocabulary,
            drop_first,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Structural checks run on construction and after loading
    pub fn validate(&self) -> Result<()> {
        if self.version != SCHEMA_VERSION {
            return Err(MergeTimeError::InvalidInput(format!(
                "unsupported schema version {}",
                self.version
            )));
        }
        for (field, levels) in &self.vocabulary {
            if levels.windows(2).any(|w| w[0] >= w[1]) {
                return Err(MergeTimeError::InvalidInput(format!(
                    "vocabulary of `{}` is not strictly sorted",
                    field
                )));
            }
        }
        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !seen.insert(column) {
                return Err(MergeTimeError::InvalidInput(format!(
                    "duplicate schema column `{}`",
                    column
                )));
            }
            if let Column::Indicator { field, value } = column {
                let known = self
                    .vocabulary
                    .get(field)
                    .map(|levels| levels.iter().any(|l| l == value))
                    .unwrap_or(false);
                if !known {
                    return Err(MergeTimeError::InvalidInput(format!(
                        "indicator `{}` has no vocabulary entry",
                        column
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn drop_first(&self) -> bool {
        self.drop_first
    }

    pub fn position(&self, column: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Numeric fields the schema requires, in column order
    pub fn numeric_fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().filter_map(|c| match c {
            Column::Numeric { name } => Some(name.as_str()),
            Column::Indicator { .. } => None,
        })
    }

    /// Categorical fields with a training vocabulary
    pub fn categorical_fields(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.keys().map(String::as_str)
    }

    /// Training levels of a categorical field, sorted
    pub fn vocabulary(&self, field: &str) -> Option<&[String]> {
        self.vocabulary.get(field).map(Vec::as_slice)
    }

    /// Whether `value` was observed for `field` during training
    pub fn knows_value(&self, field: &str, value: &str) -> bool {
        self.vocabulary(field)
            .map(|levels| levels.binary_search_by(|l| l.as_str().cmp(value)).is_ok())
            .unwrap_or(false)
    }

    /// Reference level omitted under drop-first encoding
    pub fn reference_level(&self, field: &str) -> Option<&str> {
        if !self.drop_first {
            return None;
        }
        self.vocabulary(field)
            .and_then(|levels| levels.first())
            .map(String::as_str)
    }

    /// Blake3 digest of the canonical JSON form
    pub fn hash_hex(&self) -> Result<String> {
        hash_canonical_hex(self).map_err(|e| MergeTimeError::InvalidInput(e.to_string()))
    }
}

/// Result of a schema capture
#[derive(Debug, Clone)]
pub struct Capture {
    /// Training matrix with leakage columns removed, columns in schema order
    pub matrix: Matrix,
    pub schema: Schema,
    /// Leakage names that matched no field
    pub unmatched_leakage: Vec<String>,
}

/// Encodes a training batch and freezes the leakage-free column order
#[derive(Debug, Clone)]
pub struct SchemaCapture {
    encoder: CategoricalEncoder,
    leakage: BTreeSet<String>,
}

impl SchemaCapture {
    pub fn new<I, S>(encoder: CategoricalEncoder, leakage_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            encoder,
            leakage: leakage_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn leakage_fields(&self) -> impl Iterator<Item = &str> {
        self.leakage.iter().map(String::as_str)
    }

    pub fn capture(&self, records: &[Record]) -> Result<Capture> {
        if records.is_empty() {
            return Err(MergeTimeError::EmptyDataset(
                "schema capture requires at least one training record".into(),
            ));
        }

        let encoding = self.encoder.encode(records)?;

        let present: HashSet<&str> = records
            .iter()
            .flat_map(|r| r.iter().map(|(name, _)| name))
            .collect();
        let unmatched_leakage: Vec<String> = self
            .leakage
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &unmatched_leakage {
            warn!(field = %name, "leakage field matched no column; nothing excluded");
        }

        let keep: Vec<usize> = encoding
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !self.leakage.contains(c.field()))
            .map(|(i, _)| i)
            .collect();
        debug!(
            encoded = encoding.columns.len(),
            kept = keep.len(),
            "dropped leakage columns"
        );

        let columns: Vec<Column> = keep.iter().map(|&i| encoding.columns[i].clone()).collect();
        let vocabulary: BTreeMap<String, Vec<String>> = encoding
            .vocabulary
            .into_iter()
            .filter(|(field, _)| !self.leakage.contains(field))
            .collect();

        let matrix = encoding.matrix.select_columns(&keep);
        let schema = Schema::new(columns, vocabulary, self.encoder.drop_first())?;

        Ok(Capture {
            matrix,
            schema,
            unmatched_leakage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training() -> Vec<Record> {
        vec![
            Record::new()
                .with("pr_number", 1.0)
                .with("additions", 10.0)
                .with("total_comments", 4.0)
                .with("repo", "vscode"),
            Record::new()
                .with("pr_number", 2.0)
                .with("additions", 20.0)
                .with("total_comments", 1.0)
                .with("repo", "excalidraw"),
        ]
    }

    #[test]
    fn leakage_columns_excluded() {
        let capture = SchemaCapture::new(
            CategoricalEncoder::new(),
            ["pr_number", "total_comments"],
        )
        .capture(&training())
        .unwrap();

        assert_eq!(
            capture.schema.column_names(),
            vec!["additions", "repo_excalidraw", "repo_vscode"]
        );
        assert_eq!(capture.matrix.width, 3);
        assert_eq!(capture.matrix.row(0), &[10.0, 0.0, 1.0]);
        assert!(capture.unmatched_leakage.is_empty());
    }

    #[test]
    fn categorical_leakage_drops_indicators_and_vocabulary() {
        let capture = SchemaCapture::new(CategoricalEncoder::new(), ["repo"])
            .capture(&training())
            .unwrap();
        assert!(capture.schema.columns().iter().all(|c| c.field() != "repo"));
        assert!(capture.schema.vocabulary("repo").is_none());
    }

    #[test]
    fn unmatched_leakage_is_reported() {
        let capture = SchemaCapture::new(CategoricalEncoder::new(), ["pr_numbr"])
            .capture(&training())
            .unwrap();
        assert_eq!(capture.unmatched_leakage, vec!["pr_numbr".to_string()]);
        assert!(capture.schema.column_names().contains(&"pr_number".to_string()));
    }

    #[test]
    fn empty_batch_fails() {
        let err = SchemaCapture::new(CategoricalEncoder::new(), ["id"])
            .capture(&[])
            .unwrap_err();
        assert!(matches!(err, MergeTimeError::EmptyDataset(_)));
    }

    #[test]
    fn reference_level_tracked_with_drop_first() {
        let capture = SchemaCapture::new(CategoricalEncoder::with_drop_first(true), ["pr_number"])
            .capture(&training())
            .unwrap();
        let schema = &capture.schema;
        assert_eq!(schema.reference_level("repo"), Some("excalidraw"));
        assert!(schema.knows_value("repo", "excalidraw"));
        assert!(!schema.knows_value("repo", "unknown/repo"));
        assert_eq!(
            schema.columns().iter().filter(|c| c.field() == "repo").count(),
            1
        );
    }

    #[test]
    fn duplicate_columns_rejected() {
        let err = Schema::new(
            vec![Column::numeric("a"), Column::numeric("a")],
            BTreeMap::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, MergeTimeError::InvalidInput(_)));
    }

    #[test]
    fn schema_hash_is_stable() {
        let capture = SchemaCapture::new(CategoricalEncoder::new(), ["pr_number"])
            .capture(&training())
            .unwrap();
        let h1 = capture.schema.hash_hex().unwrap();
        let h2 = capture.schema.clone().hash_hex().unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
