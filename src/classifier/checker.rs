//! Entry points: parse, resolve, extract, classify, aggregate.

use thiserror::Error;
use tracing::debug;

use crate::classifier::aggregator::{self, OccurrenceVerdict};
use crate::classifier::config::{CheckerConfig, ConfigError};
use crate::classifier::extractor::extract_predicates;
use crate::classifier::partition_spec::PartitionSpec;
use crate::classifier::patterns::{AliasPolicy, TableReport, Violation};
use crate::classifier::range_estimator::{classify, RangeOptions};
use crate::classifier::resolver::resolve_tables;
use crate::parser::sql_parser::{self, ParseFailure, DEFAULT_DIALECT};

/// Errors surfaced by the strict entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The query text could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

/// Tuning knobs for a [`PartitionChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOptions {
    /// `sqlparser` dialect name.
    pub dialect: String,
    /// How several occurrences of one table are combined.
    pub alias_policy: AliasPolicy,
    /// Treat `>` and `<` as exclusive finite bounds.
    pub strict_bounds_are_finite: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            dialect: DEFAULT_DIALECT.to_string(),
            alias_policy: AliasPolicy::default(),
            strict_bounds_are_finite: false,
        }
    }
}

/// Checks queries against a fixed set of partition specs.
///
/// A checker holds no per-call state and can be shared between threads.
#[derive(Debug, Clone)]
pub struct PartitionChecker {
    specs: Vec<PartitionSpec>,
    options: CheckerOptions,
}

impl PartitionChecker {
    /// A checker with default options.
    pub fn new(specs: Vec<PartitionSpec>) -> Self {
        Self {
            specs,
            options: CheckerOptions::default(),
        }
    }

    /// A checker with explicit options; fails on an unknown dialect.
    pub fn with_options(
        specs: Vec<PartitionSpec>,
        options: CheckerOptions,
    ) -> Result<Self, ParseFailure> {
        sql_parser::validate_dialect(&options.dialect)?;
        Ok(Self { specs, options })
    }

    /// A checker built from a loaded configuration.
    pub fn from_config(config: CheckerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let options = CheckerOptions {
            dialect: config.dialect,
            alias_policy: config.alias_policy,
            strict_bounds_are_finite: config.strict_bounds_are_finite,
        };
        Ok(Self::with_options(config.tables, options)?)
    }

    /// Configured specs.
    pub fn specs(&self) -> &[PartitionSpec] {
        &self.specs
    }

    /// Options in effect.
    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    /// Violations found in `sql`, in table discovery order.
    ///
    /// Text that cannot be parsed yields no violations.
    pub fn check_query(&self, sql: &str) -> Vec<Violation> {
        match self.check_tables(sql) {
            Ok(reports) => reports
                .into_iter()
                .filter_map(|report| report.violation)
                .collect(),
            Err(err) => {
                debug!(%err, "query could not be parsed, skipping partition checks");
                Vec::new()
            }
        }
    }

    /// One report per configured table referenced by `sql`, compliant or not.
    pub fn check_tables(&self, sql: &str) -> Result<Vec<TableReport>, CheckError> {
        let tree = sql_parser::parse_query(sql, &self.options.dialect)?;
        let resolution = resolve_tables(&tree, &self.specs);
        if resolution.is_unmatched() {
            debug!("no configured table referenced");
            return Ok(Vec::new());
        }

        let filters = extract_predicates(&tree, &resolution, &self.specs);
        let range_options = RangeOptions {
            strict_bounds_are_finite: self.options.strict_bounds_are_finite,
        };

        let verdicts: Vec<OccurrenceVerdict> = resolution
            .matched()
            .map(|(occurrence, spec_idx)| {
                let table = &resolution.refs()[occurrence];
                let spec = &self.specs[spec_idx];
                let classification = classify(
                    &filters[occurrence],
                    tree.scopes[table.scope].is_unfiltered(),
                    spec.date_semantics(),
                    range_options,
                );
                let violation = aggregator::evaluate(&classification, spec);
                debug!(
                    table = %table.written_name,
                    binding = %table.binding,
                    shape = %classification.shape,
                    estimated_days = ?classification.estimated_days,
                    violation = ?violation.as_ref().map(|v| v.kind),
                    "classified table occurrence"
                );
                OccurrenceVerdict {
                    spec: spec_idx,
                    scope: table.scope,
                    ordinal: table.ordinal,
                    classification,
                    violation,
                }
            })
            .collect();

        Ok(aggregator::aggregate(
            &verdicts,
            &self.specs,
            self.options.alias_policy,
        ))
    }
}

/// Check `sql` against `specs` with default options.
pub fn check_partition_usage(sql: &str, specs: &[PartitionSpec]) -> Vec<Violation> {
    PartitionChecker::new(specs.to_vec()).check_query(sql)
}
