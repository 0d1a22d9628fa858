use std::num::NonZeroU32;

use serde::Deserialize;
use thiserror::Error;

use crate::parser::date_pattern::{DatePattern, DatePatternError};
use crate::parser::names::{normalize_identifier, normalized_name_parts, unqualified_name};

/// Invalid partition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// `table_name` is empty.
    #[error("partition spec table name must not be empty")]
    EmptyTableName,
    /// `column_name` is empty.
    #[error("partition spec for '{0}' has an empty column name")]
    EmptyColumnName(String),
    /// `max_date_range_days` is zero.
    #[error("max_date_range_days for '{0}' must be at least 1")]
    ZeroMaxRange(String),
    /// The date pattern does not compile.
    #[error("invalid date pattern for '{table}': {source}")]
    DatePattern {
        /// Table the pattern belongs to.
        table: String,
        /// Underlying pattern error.
        #[source]
        source: DatePatternError,
    },
}

/// Date semantics attached to a partition column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSemantics {
    /// Pattern used to read literal bounds.
    pub pattern: DatePattern,
    /// Widest allowed range, inclusive; `None` disables the check.
    pub max_date_range_days: Option<NonZeroU32>,
}

/// A monitored table and its partition column.
///
/// Names are matched case-insensitively. A spec built with
/// [`PartitionSpec::with_dates`] also carries [`DateSemantics`] and takes part
/// in date-range estimation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPartitionSpec")]
pub struct PartitionSpec {
    table_name: String,
    column_name: String,
    date: Option<DateSemantics>,
    name_parts: Vec<String>,
    normalized_column: String,
}

impl PartitionSpec {
    /// A table whose `column_name` must be filtered with a finite range.
    pub fn new(table_name: &str, column_name: &str) -> Result<Self, SpecError> {
        let table_name = table_name.trim();
        if table_name.is_empty() || unqualified_name(table_name).is_empty() {
            return Err(SpecError::EmptyTableName);
        }
        let column_name = column_name.trim();
        if column_name.is_empty() {
            return Err(SpecError::EmptyColumnName(table_name.to_string()));
        }

        Ok(Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            date: None,
            name_parts: normalized_name_parts(table_name),
            normalized_column: normalize_identifier(column_name),
        })
    }

    /// A date-partitioned table whose literals follow `date_pattern`.
    pub fn with_dates(
        table_name: &str,
        column_name: &str,
        date_pattern: &str,
        max_date_range_days: Option<u32>,
    ) -> Result<Self, SpecError> {
        let mut spec = Self::new(table_name, column_name)?;
        let pattern = DatePattern::new(date_pattern).map_err(|source| SpecError::DatePattern {
            table: spec.table_name.clone(),
            source,
        })?;
        let max_date_range_days = match max_date_range_days {
            Some(days) => Some(
                NonZeroU32::new(days)
                    .ok_or_else(|| SpecError::ZeroMaxRange(spec.table_name.clone()))?,
            ),
            None => None,
        };
        spec.date = Some(DateSemantics {
            pattern,
            max_date_range_days,
        });
        Ok(spec)
    }

    /// Table name as configured.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Partition column name as configured.
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Date semantics, when configured.
    pub fn date_semantics(&self) -> Option<&DateSemantics> {
        self.date.as_ref()
    }

    /// Configured maximum range in days, if any.
    pub fn max_date_range_days(&self) -> Option<u32> {
        self.date
            .as_ref()
            .and_then(|d| d.max_date_range_days)
            .map(NonZeroU32::get)
    }

    /// Rightmost segment of the table name (`gridhive.fact.sales` -> `sales`).
    pub fn unqualified_table_name(&self) -> String {
        unqualified_name(&self.table_name)
    }

    /// Lowercased dot-separated parts of the table name.
    pub fn normalized_parts(&self) -> &[String] {
        &self.name_parts
    }

    /// True when `column` names this spec's partition column.
    pub fn is_partition_column(&self, column: &str) -> bool {
        normalize_identifier(column) == self.normalized_column
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPartitionSpec {
    #[serde(alias = "table_name")]
    table: String,
    #[serde(alias = "column_name")]
    column: String,
    #[serde(default)]
    date_pattern: Option<String>,
    #[serde(default)]
    max_date_range_days: Option<u32>,
}

impl TryFrom<RawPartitionSpec> for PartitionSpec {
    type Error = SpecError;

    fn try_from(raw: RawPartitionSpec) -> Result<Self, Self::Error> {
        match raw.date_pattern {
            Some(pattern) => {
                PartitionSpec::with_dates(&raw.table, &raw.column, &pattern, raw.max_date_range_days)
            }
            None if raw.max_date_range_days.is_some() => Err(SpecError::DatePattern {
                table: raw.table,
                source: DatePatternError::Empty,
            }),
            None => PartitionSpec::new(&raw.table, &raw.column),
        }
    }
}
