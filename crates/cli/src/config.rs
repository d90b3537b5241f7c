//! Serving configuration: defaults, optional TOML file, `MERGETIME_*` env.

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Directory holding model.json, schema.json and manifest.json
    pub artifact_dir: PathBuf,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("models/merge_time"),
            log_level: "warn".to_string(),
        }
    }
}

impl ServeConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Configuration file {} not found (specified via --config)", path.display());
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("MERGETIME")
                .prefix_separator("_")
                .separator("__"),
        );

        builder
            .build()?
            .try_deserialize()
            .context("Invalid serve configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_sets_artifact_dir() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "artifact_dir = \"/srv/mergetime\"").unwrap();

        let config = ServeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("/srv/mergetime"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn missing_file_rejected() {
        assert!(ServeConfig::load(Some(Path::new("/nonexistent/serve.toml"))).is_err());
    }
}
