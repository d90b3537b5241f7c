//! Alignment of a single inference record against a frozen schema
//!
//! The record is encoded on its own, then reconciled column by column:
//! produced columns unknown to the schema are discarded, schema indicators
//! the record did not produce are zero-filled, and the output follows schema
//! order exactly. A numeric column the record cannot supply is an error.
//!
//! Every discarded record field gets a `DiscardedColumn` note, whether it
//! was numeric or categorical. Categorical fields are noted once by field
//! name, not once per indicator.

use crate::encoder::{CategoricalEncoder, Column};
use crate::errors::{MergeTimeError, Result};
use crate::record::Record;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Caller-visible diagnostic produced while aligning a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentNote {
    /// Value never seen for this field in training; all its indicators are 0
    UnseenCategory { field: String, value: String },
    /// Schema categorical field absent from the record; all its indicators are 0
    AbsentCategory { field: String },
    /// Field supplied by the record but unknown to the schema
    DiscardedColumn { column: String },
}

impl fmt::Display for AlignmentNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentNote::UnseenCategory { field, value } => write!(
                f,
                "'{}' was not seen for `{}` during training; the estimate uses baseline behaviour for this field",
                value, field
            ),
            AlignmentNote::AbsentCategory { field } => write!(
                f,
                "`{}` was not provided; the estimate uses baseline behaviour for this field",
                field
            ),
            AlignmentNote::DiscardedColumn { column } => {
                write!(f, "`{}` is not a model feature and was ignored", column)
            }
        }
    }
}

/// Feature vector in schema order plus diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Aligned {
    pub features: Vec<f64>,
    pub notes: Vec<AlignmentNote>,
}

impl Aligned {
    pub fn has_unseen_category(&self) -> bool {
        self.notes
            .iter()
            .any(|n| matches!(n, AlignmentNote::UnseenCategory { .. }))
    }
}

/// Align `record` against `schema`.
///
/// The output always has `schema.len()` entries in schema order. Fails only
/// with [`MergeTimeError::MissingField`] when a schema numeric field is not
/// supplied as a number, or [`MergeTimeError::InvalidInput`] if the record
/// itself cannot be encoded.
pub fn align(record: &Record, schema: &Schema) -> Result<Aligned> {
    let encoding = CategoricalEncoder::new().encode_one(record)?;

    let produced: HashMap<&Column, f64> = encoding
        .columns
        .iter()
        .zip(encoding.matrix.row(0).iter().copied())
        .collect();

    let mut features = Vec::with_capacity(schema.len());
    for column in schema.columns() {
        match (produced.get(column), column) {
            (Some(&value), _) => features.push(value),
            (None, Column::Indicator { .. }) => features.push(0.0),
            (None, Column::Numeric { name }) => {
                return Err(MergeTimeError::MissingField {
                    field: name.clone(),
                })
            }
        }
    }

    let mut notes = Vec::new();
    for field in schema.categorical_fields() {
        match record.get(field).and_then(|v| v.as_categorical()) {
            Some(value) if !schema.knows_value(field, value) => {
                notes.push(AlignmentNote::UnseenCategory {
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
            Some(_) => {}
            None => notes.push(AlignmentNote::AbsentCategory {
                field: field.to_string(),
            }),
        }
    }
    for column in &encoding.columns {
        let discarded = match column {
            Column::Numeric { .. } => schema.position(column).is_none(),
            Column::Indicator { field, .. } => schema.vocabulary(field).is_none(),
        };
        if discarded {
            notes.push(AlignmentNote::DiscardedColumn {
                column: column.field().to_string(),
            });
        }
    }

    Ok(Aligned { features, notes })
}

/// Stateless aligner bound to one schema
#[derive(Debug, Clone, Copy)]
pub struct SchemaAligner<'a> {
    schema: &'a Schema,
}

impl<'a> SchemaAligner<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn align(&self, record: &Record) -> Result<Aligned> {
        align(record, self.schema)
    }

    /// Align several records into a matrix, stopping at the first failure
    pub fn align_batch(&self, records: &[Record]) -> Result<crate::record::Matrix> {
        let mut matrix = crate::record::Matrix::new(self.schema.len());
        for record in records {
            matrix.push_row(self.align(record)?.features)?;
        }
        Ok(matrix)
    }
}
