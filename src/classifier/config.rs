use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::classifier::partition_spec::PartitionSpec;
use crate::classifier::patterns::AliasPolicy;
use crate::parser::sql_parser::{validate_dialect, ParseFailure, DEFAULT_DIALECT};

/// Errors raised while loading a checker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The JSON is malformed or a table entry is invalid.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The dialect is not known to the SQL parser.
    #[error(transparent)]
    Dialect(#[from] ParseFailure),
    /// No table entries.
    #[error("configuration lists no partitioned tables")]
    NoTables,
}

/// Checker configuration as stored in a JSON file.
///
/// ```json
/// {
///   "dialect": "generic",
///   "alias_policy": "any",
///   "tables": [{"table": "fact.sales", "column": "day", "date_pattern": "YYYY-mm-dd"}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckerConfig {
    /// `sqlparser` dialect name.
    #[serde(default = "default_dialect")]
    pub dialect: String,
    /// How several occurrences of the same table are combined.
    #[serde(default)]
    pub alias_policy: AliasPolicy,
    /// Treat `>` and `<` as finite (exclusive) bounds.
    #[serde(default)]
    pub strict_bounds_are_finite: bool,
    /// Report unparseable SQL as an error instead of passing it.
    #[serde(default)]
    pub strict: bool,
    /// Monitored tables.
    pub tables: Vec<PartitionSpec>,
}

fn default_dialect() -> String {
    DEFAULT_DIALECT.to_string()
}

impl CheckerConfig {
    /// A configuration with default options for `tables`.
    pub fn new(tables: Vec<PartitionSpec>) -> Self {
        Self {
            dialect: default_dialect(),
            alias_policy: AliasPolicy::default(),
            strict_bounds_are_finite: false,
            strict: false,
            tables,
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CheckerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check fields that serde cannot validate on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tables.is_empty() {
            return Err(ConfigError::NoTables);
        }
        validate_dialect(&self.dialect)?;
        Ok(())
    }
}
