/// Rule chain and alias-policy aggregation of occurrence verdicts.
pub mod aggregator;
/// `PartitionChecker` and the top-level entry points.
pub mod checker;
/// JSON checker configuration.
pub mod config;
/// Partition predicate extraction from WHERE and JOIN ON clauses.
pub mod extractor;
/// Monitored table and partition column configuration.
pub mod partition_spec;
/// Violation, shape, predicate and report types.
pub mod patterns;
/// Range shape classification and date-span estimation.
pub mod range_estimator;
/// Table reference resolution and spec matching.
pub mod resolver;
