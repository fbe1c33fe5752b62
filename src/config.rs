use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::{error::PipelineError, schema::AliasTable};

/// Runtime settings for one batch. Every field has a default, so an empty YAML
/// document is a valid config.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Extensions (without the dot) treated as sheet files, case-insensitive.
    pub sheet_extensions: Vec<String>,
    /// How many archives deep extraction may recurse.
    pub max_archive_depth: usize,
    /// Most bytes read out of one archive entry; zip headers are not trusted.
    pub max_entry_bytes: u64,
    /// Extra header aliases, `header text -> logical column name`.
    pub aliases: BTreeMap<String, String>,
    /// chrono format strings tried, in order, on textual dates.
    pub date_formats: Vec<String>,
    pub completed_status: String,
    pub pending_status: String,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_extensions: ["xlsx", "xlsm", "xls", "ods"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_archive_depth: 8,
            max_entry_bytes: 256 << 20,
            aliases: BTreeMap::new(),
            date_formats: [
                "%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            completed_status: "COMPLETED".into(),
            pending_status: "PENDING".into(),
            threads: 0,
        }
    }
}

impl Config {
    /// Load and validate a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&text).map_err(|e| PipelineError::InvalidConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config
            .validate()
            .with_context(|| format!("validating config {}", path.display()))?;
        info!(path = %path.display(), aliases = config.aliases.len(), "loaded config");
        Ok(config)
    }

    /// Checks that the logical schema can be established from this config.
    pub fn validate(&self) -> Result<(), PipelineError> {
        AliasTable::from_config(self).map(|_| ())
    }

    pub fn is_sheet_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.sheet_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext.to_lowercase())))
    }
}
