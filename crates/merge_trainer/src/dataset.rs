//! CSV dataset loading and preprocessing
//!
//! Reads the raw pull request table (header-driven, column order free),
//! derives `time_to_merge_hours` from the creation and merge timestamps,
//! and drops outliers. Timestamps never reach the feature records.

use chrono::{DateTime, FixedOffset};
use mergetime_core::record::fields;
use mergetime_core::{MergeTimeError, Record};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{Result, TrainerError};

/// Every field a loaded record can carry
pub const RECORD_FIELDS: [&str; 12] = [
    fields::REPO,
    "pr_number",
    fields::TITLE_LEN,
    fields::BODY_LEN,
    fields::AUTHOR_ASSOC,
    fields::NUM_LABELS,
    fields::IS_DRAFT,
    fields::ADDITIONS,
    fields::DELETIONS,
    fields::CHANGED_FILES,
    fields::NUM_COMMITS,
    "total_comments",
];

/// One row of the raw pull request table
#[derive(Debug, Clone, Deserialize)]
struct RawRow {
    repo: String,
    #[serde(default)]
    pr_number: Option<f64>,
    created_at: String,
    merged_at: String,
    title_len: f64,
    body_len: f64,
    author_assoc: String,
    num_labels: f64,
    #[serde(deserialize_with = "deserialize_flag")]
    is_draft: bool,
    additions: f64,
    deletions: f64,
    changed_files: f64,
    num_commits: f64,
    #[serde(default)]
    total_comments: Option<f64>,
}

impl RawRow {
    fn into_record(self) -> Record {
        let mut record = Record::new().with(fields::REPO, self.repo);
        if let Some(pr_number) = self.pr_number {
            record.insert("pr_number", pr_number);
        }
        record = record
            .with(fields::TITLE_LEN, self.title_len)
            .with(fields::BODY_LEN, self.body_len)
            .with(fields::AUTHOR_ASSOC, self.author_assoc)
            .with(fields::NUM_LABELS, self.num_labels)
            .with(fields::IS_DRAFT, self.is_draft)
            .with(fields::ADDITIONS, self.additions)
            .with(fields::DELETIONS, self.deletions)
            .with(fields::CHANGED_FILES, self.changed_files)
            .with(fields::NUM_COMMITS, self.num_commits);
        if let Some(total_comments) = self.total_comments {
            record.insert("total_comments", total_comments);
        }
        record
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid boolean {:?}", raw)))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" | "" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z"))
        .ok()
}

/// Row counts from one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub kept: usize,
    pub dropped_outliers: usize,
}

/// Feature records with their merge-time labels
#[derive(Clone, Debug)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub labels: Vec<f64>,
    pub report: LoadReport,
}

impl Dataset {
    /// Load dataset from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, max_hours: f64) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            TrainerError::Dataset(format!("failed to open {}: {}", path.display(), err))
        })?;
        Self::from_reader(file, max_hours)
    }

    /// Load dataset from any CSV source with a header row
    pub fn from_reader<R: Read>(source: R, max_hours: f64) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        let mut labels = Vec::new();
        let mut report = LoadReport::default();

        for row in reader.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            report.rows_read += 1;

            let raw: RawRow = row
                .deserialize(Some(&headers))
                .map_err(|err| TrainerError::Dataset(format!("line {}: {}", line, err)))?;

            let created = parse_timestamp(&raw.created_at).ok_or_else(|| {
                TrainerError::Dataset(format!("line {}: invalid created_at {:?}", line, raw.created_at))
            })?;
            let merged = parse_timestamp(&raw.merged_at).ok_or_else(|| {
                TrainerError::Dataset(format!("line {}: invalid merged_at {:?}", line, raw.merged_at))
            })?;

            let hours = (merged - created).num_milliseconds() as f64 / 3_600_000.0;
            if !(0.0..max_hours).contains(&hours) {
                debug!(line, hours, "Dropping outlier row");
                report.dropped_outliers += 1;
                continue;
            }

            records.push(raw.into_record());
            labels.push(hours);
        }

        report.kept = records.len();
        info!(
            rows_read = report.rows_read,
            kept = report.kept,
            dropped_outliers = report.dropped_outliers,
            "Loaded pull request dataset"
        );

        if records.is_empty() {
            return Err(MergeTimeError::EmptyDataset(format!(
                "no rows left after preprocessing ({} read, {} outliers)",
                report.rows_read, report.dropped_outliers
            ))
            .into());
        }

        Ok(Self {
            records,
            labels,
            report,
        })
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Minimum, mean and maximum label
    pub fn label_stats(&self) -> Option<(f64, f64, f64)> {
        if self.labels.is_empty() {
            return None;
        }
        let min = self.labels.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.labels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = self.labels.iter().sum::<f64>() / self.labels.len() as f64;
        Some((min, mean, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergetime_core::Value;

    const HEADER: &str = "repo,pr_number,created_at,merged_at,title_len,body_len,author_assoc,num_labels,is_draft,additions,deletions,changed_files,num_commits,total_comments";

    fn csv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_label_from_timestamps() {
        let data = csv(&[
            "microsoft/vscode,1,2024-01-01T00:00:00Z,2024-01-01T12:30:00Z,40,300,MEMBER,2,False,10,5,1,1,3",
        ]);
        let dataset = Dataset::from_reader(data.as_bytes(), 720.0).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.labels[0], 12.5);

        let record = &dataset.records[0];
        assert_eq!(record.get("is_draft"), Some(&Value::Numeric(0.0)));
        assert_eq!(record.get("repo"), Some(&Value::Categorical("microsoft/vscode".into())));
        assert!(!record.contains("created_at"));
        assert!(!record.contains("merged_at"));
    }

    #[test]
    fn test_outliers_dropped() {
        let data = csv(&[
            "a/b,1,2024-01-01T00:00:00Z,2024-01-02T00:00:00Z,1,1,NONE,0,0,1,1,1,1,0",
            // merged before created
            "a/b,2,2024-01-02T00:00:00Z,2024-01-01T00:00:00Z,1,1,NONE,0,0,1,1,1,1,0",
            // exactly 30 days
            "a/b,3,2024-01-01T00:00:00Z,2024-01-31T00:00:00Z,1,1,NONE,0,0,1,1,1,1,0",
        ]);
        let dataset = Dataset::from_reader(data.as_bytes(), 720.0).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(
            dataset.report,
            LoadReport {
                rows_read: 3,
                kept: 1,
                dropped_outliers: 2
            }
        );
    }

    #[test]
    fn test_column_order_is_free() {
        let data = "merged_at,created_at,repo,author_assoc,title_len,body_len,num_labels,is_draft,additions,deletions,changed_files,num_commits\n\
                    2024-01-01T02:00:00Z,2024-01-01T00:00:00Z,x/y,CONTRIBUTOR,5,6,0,true,1,2,3,4";
        let dataset = Dataset::from_reader(data.as_bytes(), 720.0).unwrap();
        assert_eq!(dataset.labels, vec![2.0]);
        let record = &dataset.records[0];
        assert_eq!(record.get("is_draft"), Some(&Value::Numeric(1.0)));
        assert!(!record.contains("pr_number"));
        assert!(!record.contains("total_comments"));
    }

    #[test]
    fn test_invalid_timestamp_reports_line() {
        let data = csv(&["a/b,1,yesterday,2024-01-01T00:00:00Z,1,1,NONE,0,0,1,1,1,1,0"]);
        let err = Dataset::from_reader(data.as_bytes(), 720.0).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 2"), "{}", message);
        assert!(message.contains("created_at"));
    }

    #[test]
    fn test_empty_after_filtering() {
        let data = csv(&["a/b,1,2024-01-01T00:00:00Z,2024-03-01T00:00:00Z,1,1,NONE,0,0,1,1,1,1,0"]);
        let err = Dataset::from_reader(data.as_bytes(), 720.0).unwrap_err();
        assert!(matches!(err, TrainerError::Core(MergeTimeError::EmptyDataset(_))));
    }

    #[test]
    fn test_record_fields_cover_loaded_records() {
        let data = csv(&["a/b,1,2024-01-01T00:00:00Z,2024-01-01T01:00:00Z,1,1,NONE,0,0,1,1,1,1,0"]);
        let dataset = Dataset::from_reader(data.as_bytes(), 720.0).unwrap();
        let names: Vec<&str> = dataset.records[0].iter().map(|(name, _)| name).collect();
        assert_eq!(names, RECORD_FIELDS.to_vec());
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
