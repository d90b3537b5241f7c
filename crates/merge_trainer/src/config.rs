//! Layered training configuration
//!
//! Built-in defaults, then an optional TOML file, then `MERGETIME_*`
//! environment variables. Nested keys use `__`, for example
//! `MERGETIME_SPLIT__SEED=7` or `MERGETIME_GBDT__NUM_TREES=200`.

use config::{Config, Environment, File as ConfigFile};
use mergetime_core::{CategoricalEncoder, DEFAULT_LEAKAGE_FIELDS};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::RECORD_FIELDS;
use crate::errors::{Result, TrainerError};
use crate::split::{SplitFractions, SplitHarness};
use crate::trainer::GbdtConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MERGETIME";

/// Train / validation / test proportions and the shuffle seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_frac: f64,
    pub validation_frac: f64,
    pub test_frac: f64,
    pub seed: i64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        let fractions = SplitFractions::default();
        Self {
            train_frac: fractions.train,
            validation_frac: fractions.validation,
            test_frac: fractions.test,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn harness(&self) -> Result<SplitHarness> {
        let fractions = SplitFractions::new(self.train_frac, self.validation_frac, self.test_frac)?;
        Ok(SplitHarness::new(fractions, self.seed)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Omit the first sorted level of every categorical field
    pub drop_first: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self { drop_first: true }
    }
}

impl EncodingConfig {
    pub fn encoder(&self) -> CategoricalEncoder {
        CategoricalEncoder::with_drop_first(self.drop_first)
    }
}

/// Everything the training pipeline needs besides the data itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub split: SplitConfig,
    pub encoding: EncodingConfig,
    /// Fields removed before schema capture. Defaults to the post-merge
    /// fields the CSV loader actually produces.
    pub leakage_fields: Vec<String>,
    /// Rows whose merge time reaches this many hours are dropped
    pub max_hours: f64,
    pub gbdt: GbdtConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            encoding: EncodingConfig::default(),
            leakage_fields: DEFAULT_LEAKAGE_FIELDS
                .iter()
                .filter(|field| RECORD_FIELDS.contains(*field))
                .map(|field| field.to_string())
                .collect(),
            max_hours: 24.0 * 30.0,
            gbdt: GbdtConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Load configuration, layering an optional file and the environment
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(TrainerError::Config(config::ConfigError::Message(format!(
                    "configuration file {} not found",
                    path.display()
                ))));
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("leakage_fields"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.split.harness()?;
        self.gbdt.validate()?;
        if !(self.max_hours.is_finite() && self.max_hours > 0.0) {
            return Err(mergetime_core::MergeTimeError::InvalidParameters(format!(
                "max_hours must be positive, got {}",
                self.max_hours
            ))
            .into());
        }
        Ok(())
    }
}
