//! Raw records and encoded matrices
//!
//! A [`Record`] is an ordered list of named fields, each either numeric or
//! categorical. [`PullRequestInput`] is the typed, validated shape of a
//! pending pull request and converts into a record for alignment.

use crate::errors::{MergeTimeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a single record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
}

impl Value {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            Value::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Value::Numeric(_) => None,
            Value::Categorical(s) => Some(s),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Numeric(_) => "numeric",
            Value::Categorical(_) => "categorical",
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Numeric(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Numeric(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Numeric(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Numeric(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Categorical(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Categorical(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Categorical(s) => f.write_str(s),
        }
    }
}

/// Ordered mapping from field name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a field; an existing field keeps its position and gets the new value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a flat JSON object.
    ///
    /// Numbers become numeric fields, booleans become 0/1, strings become
    /// categorical fields. Nulls are skipped; nested values are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| MergeTimeError::InvalidInput("record must be a JSON object".into()))?;

        let mut record = Record::new();
        for (name, field) in object {
            match field {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(b) => record.insert(name.clone(), *b),
                serde_json::Value::Number(n) => {
                    let v = n.as_f64().ok_or_else(|| {
                        MergeTimeError::InvalidInput(format!("field `{}` is not a finite number", name))
                    })?;
                    record.insert(name.clone(), v);
                }
                serde_json::Value::String(s) => record.insert(name.clone(), s.clone()),
                _ => {
                    return Err(MergeTimeError::InvalidInput(format!(
                        "field `{}` must be a scalar",
                        name
                    )))
                }
            }
        }
        Ok(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Dense row-major feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: Vec<Vec<f64>>,
    pub width: usize,
}

impl Matrix {
    pub fn new(width: usize) -> Self {
        Self {
            rows: Vec::new(),
            width,
        }
    }

    /// Build from rows, rejecting ragged input
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(MergeTimeError::shape("matrix row", width, bad.len()));
        }
        Ok(Self { rows, width })
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.width {
            return Err(MergeTimeError::shape("matrix row", self.width, row.len()));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.rows[idx]
    }

    /// Copy the given rows, in the given order, into a new matrix
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        Matrix {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            width: self.width,
        }
    }

    /// Keep only the listed columns, in the listed order
    pub fn select_columns(&self, columns: &[usize]) -> Matrix {
        Matrix {
            rows: self
                .rows
                .iter()
                .map(|row| columns.iter().map(|&c| row[c]).collect())
                .collect(),
            width: columns.len(),
        }
    }
}

/// Field names of a pull request record
pub mod fields {
    pub const ADDITIONS: &str = "additions";
    pub const DELETIONS: &str = "deletions";
    pub const CHANGED_FILES: &str = "changed_files";
    pub const NUM_COMMITS: &str = "num_commits";
    pub const IS_DRAFT: &str = "is_draft";
    pub const TITLE_LEN: &str = "title_len";
    pub const BODY_LEN: &str = "body_len";
    pub const NUM_LABELS: &str = "num_labels";
    pub const AUTHOR_ASSOC: &str = "author_assoc";
    pub const REPO: &str = "repo";
}

/// Attributes of a pending pull request, as collected from a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestInput {
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub num_commits: u64,
    pub is_draft: bool,
    pub title_len: u64,
    pub body_len: u64,
    pub num_labels: u64,
    pub author_assoc: String,
    pub repo: String,
}

impl PullRequestInput {
    /// Reject inputs that cannot describe a real pull request
    pub fn validate(&self) -> Result<()> {
        if self.changed_files == 0 {
            return Err(MergeTimeError::InvalidInput(
                "changed_files must be at least 1".into(),
            ));
        }
        if self.num_commits == 0 {
            return Err(MergeTimeError::InvalidInput(
                "num_commits must be at least 1".into(),
            ));
        }
        if self.author_assoc.trim().is_empty() {
            return Err(MergeTimeError::InvalidInput("author_assoc is empty".into()));
        }
        if self.repo.trim().is_empty() {
            return Err(MergeTimeError::InvalidInput("repo is empty".into()));
        }
        Ok(())
    }

    /// Validate and convert into a record in canonical field order
    pub fn into_record(self) -> Result<Record> {
        self.validate()?;
        Ok(Record::new()
            .with(fields::ADDITIONS, self.additions)
            .with(fields::DELETIONS, self.deletions)
            .with(fields::CHANGED_FILES, self.changed_files)
            .with(fields::NUM_COMMITS, self.num_commits)
            .with(fields::IS_DRAFT, self.is_draft)
            .with(fields::TITLE_LEN, self.title_len)
            .with(fields::BODY_LEN, self.body_len)
            .with(fields::NUM_LABELS, self.num_labels)
            .with(fields::AUTHOR_ASSOC, self.author_assoc)
            .with(fields::REPO, self.repo))
    }
}
