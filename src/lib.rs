//! Lint SQL queries for partition-unfriendly filters on date-partitioned tables.
#![warn(missing_docs)]

/// Partition analysis: table resolution, predicate extraction, range classification and rules.
pub mod classifier;
/// Text, JSON and markdown rendering of check results.
pub mod output;
/// SQL parsing, expression lowering, names and date patterns.
pub mod parser;

pub use classifier::checker::{check_partition_usage, CheckError, CheckerOptions, PartitionChecker};
pub use classifier::config::{CheckerConfig, ConfigError};
pub use classifier::partition_spec::{DateSemantics, PartitionSpec, SpecError};
pub use classifier::patterns::{AliasPolicy, RangeShape, TableReport, Violation, ViolationKind};
