//! One-hot encoding of raw records
//!
//! The encoder has no memory: every call enumerates only the categorical
//! values present in its own input. Stable column sets across calls are the
//! job of [`crate::schema::Schema`] and [`crate::align`].

use crate::errors::{MergeTimeError, Result};
use crate::record::{Matrix, Record, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A tagged encoded column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Column {
    /// Pass-through of a numeric field
    Numeric { name: String },
    /// 0/1 indicator for `field == value`
    Indicator { field: String, value: String },
}

impl Column {
    pub fn numeric(name: impl Into<String>) -> Self {
        Column::Numeric { name: name.into() }
    }

    pub fn indicator(field: impl Into<String>, value: impl Into<String>) -> Self {
        Column::Indicator {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Name of the raw field this column derives from
    pub fn field(&self) -> &str {
        match self {
            Column::Numeric { name } => name,
            Column::Indicator { field, .. } => field,
        }
    }

    /// Flat column name: bare field name, or `<field>_<value>`
    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn is_indicator(&self) -> bool {
        matches!(self, Column::Indicator { .. })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Numeric { name } => f.write_str(name),
            Column::Indicator { field, value } => write!(f, "{}_{}", field, value),
        }
    }
}

/// Output of one encoder call
#[derive(Debug, Clone)]
pub struct Encoding {
    pub matrix: Matrix,
    pub columns: Vec<Column>,
    /// Every categorical value observed per field, sorted, including dropped levels
    pub vocabulary: BTreeMap<String, Vec<String>>,
}

impl Encoding {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(Column::name).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Numeric,
    Categorical,
}

/// Stateless one-hot encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalEncoder {
    drop_first: bool,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Omit the first sorted level of each categorical field (k-1 columns)
    pub fn with_drop_first(drop_first: bool) -> Self {
        Self { drop_first }
    }

    pub fn drop_first(&self) -> bool {
        self.drop_first
    }

    /// Encode a batch of records into a matrix with one row per record.
    ///
    /// Absent numeric fields encode as 0; absent categorical fields encode as
    /// all-zero indicators.
    pub fn encode(&self, records: &[Record]) -> Result<Encoding> {
        self.encode_with(records, self.drop_first)
    }

    /// Encode a single record. Never drops a level, so the record's own
    /// category always gets an indicator column.
    pub fn encode_one(&self, record: &Record) -> Result<Encoding> {
        self.encode_with(std::slice::from_ref(record), false)
    }

    fn encode_with(&self, records: &[Record], drop_first: bool) -> Result<Encoding> {
        let mut order: Vec<(String, FieldKind)> = Vec::new();
        let mut kinds: HashMap<String, FieldKind> = HashMap::new();
        let mut levels: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (row_idx, record) in records.iter().enumerate() {
            for (name, value) in record.iter() {
                let kind = match value {
                    Value::Numeric(_) => FieldKind::Numeric,
                    Value::Categorical(_) => FieldKind::Categorical,
                };
                match kinds.get(name) {
                    Some(&existing) if existing != kind => {
                        return Err(MergeTimeError::InvalidInput(format!(
                            "field `{}` is {} in record {} but was {} earlier",
                            name,
                            value.kind(),
                            row_idx,
                            match existing {
                                FieldKind::Numeric => "numeric",
                                FieldKind::Categorical => "categorical",
                            }
                        )));
                    }
                    Some(_) => {}
                    None => {
                        kinds.insert(name.to_string(), kind);
                        order.push((name.to_string(), kind));
                    }
                }
                if let Value::Categorical(level) = value {
                    levels
                        .entry(name.to_string())
                        .or_default()
                        .insert(level.clone());
                }
            }
        }

        let mut columns = Vec::new();
        for (name, kind) in &order {
            if *kind == FieldKind::Numeric {
                columns.push(Column::numeric(name.clone()));
            }
        }
        for (name, kind) in &order {
            if *kind != FieldKind::Categorical {
                continue;
            }
            let skip = usize::from(drop_first);
            for level in levels[name].iter().skip(skip) {
                columns.push(Column::indicator(name.clone(), level.clone()));
            }
        }

        let index: HashMap<&Column, usize> =
            columns.iter().enumerate().map(|(i, c)| (c, i)).collect();

        let mut matrix = Matrix::new(columns.len());
        for record in records {
            let mut row = vec![0.0; columns.len()];
            for (name, value) in record.iter() {
                let column = match value {
                    Value::Numeric(_) => Column::numeric(name),
                    Value::Categorical(level) => Column::indicator(name, level.clone()),
                };
                // dropped reference levels have no column
                if let Some(&pos) = index.get(&column) {
                    row[pos] = match value {
                        Value::Numeric(v) => *v,
                        Value::Categorical(_) => 1.0,
                    };
                }
            }
            matrix.push_row(row)?;
        }

        let vocabulary = levels
            .into_iter()
            .map(|(field, set)| (field, set.into_iter().collect()))
            .collect();

        Ok(Encoding {
            matrix,
            columns,
            vocabulary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new()
                .with("additions", 10.0)
                .with("repo", "vscode")
                .with("author_assoc", "MEMBER"),
            Record::new()
                .with("additions", 3.0)
                .with("repo", "excalidraw")
                .with("author_assoc", "NONE"),
            Record::new()
                .with("additions", 7.0)
                .with("repo", "vscode")
                .with("author_assoc", "OWNER"),
        ]
    }

    #[test]
    fn one_hot_full_levels() {
        let enc = CategoricalEncoder::new().encode(&records()).unwrap();
        assert_eq!(
            enc.column_names(),
            vec![
                "additions",
                "repo_excalidraw",
                "repo_vscode",
                "author_assoc_MEMBER",
                "author_assoc_NONE",
                "author_assoc_OWNER",
            ]
        );
        assert_eq!(enc.matrix.row(0), &[10.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(enc.matrix.row(1), &[3.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn drop_first_omits_reference_level() {
        let enc = CategoricalEncoder::with_drop_first(true)
            .encode(&records())
            .unwrap();
        assert_eq!(
            enc.column_names(),
            vec!["additions", "repo_vscode", "author_assoc_NONE", "author_assoc_OWNER"]
        );
        // reference levels stay in the vocabulary
        assert_eq!(enc.vocabulary["repo"], vec!["excalidraw", "vscode"]);
        // excalidraw row has no repo indicator set
        assert_eq!(enc.matrix.row(1), &[3.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn single_record_never_drops() {
        let encoder = CategoricalEncoder::with_drop_first(true);
        let enc = encoder.encode_one(&records()[0]).unwrap();
        assert_eq!(
            enc.column_names(),
            vec!["additions", "repo_vscode", "author_assoc_MEMBER"]
        );
    }

    #[test]
    fn absent_fields_fill_zero() {
        let batch = vec![
            Record::new().with("additions", 4.0).with("repo", "a"),
            Record::new().with("deletions", 2.0),
        ];
        let enc = CategoricalEncoder::new().encode(&batch).unwrap();
        assert_eq!(enc.column_names(), vec!["additions", "deletions", "repo_a"]);
        assert_eq!(enc.matrix.row(1), &[0.0, 2.0, 0.0]);
    }

    #[test]
    fn conflicting_kinds_rejected() {
        let batch = vec![
            Record::new().with("size", 4.0),
            Record::new().with("size", "large"),
        ];
        let err = CategoricalEncoder::new().encode(&batch).unwrap_err();
        assert!(matches!(err, MergeTimeError::InvalidInput(_)));
    }

    #[test]
    fn empty_batch_encodes_to_empty_matrix() {
        let enc = CategoricalEncoder::new().encode(&[]).unwrap();
        assert!(enc.columns.is_empty());
        assert!(enc.matrix.is_empty());
    }
}
