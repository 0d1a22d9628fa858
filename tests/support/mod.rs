#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlranger::classifier::checker::PartitionChecker;
use sqlranger::classifier::config::CheckerConfig;
use sqlranger::classifier::partition_spec::PartitionSpec;
use sqlranger::classifier::patterns::{TableReport, ViolationKind};

pub(crate) fn fixture_dir(fixture: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(fixture)
}

pub(crate) fn read_fixture_sql(fixture: &str) -> String {
    let path = fixture_dir(fixture).join("input.sql");
    std::fs::read_to_string(path).expect("fixture SQL should be readable")
}

pub(crate) fn load_fixture_config(fixture: &str) -> CheckerConfig {
    CheckerConfig::from_path(&fixture_dir(fixture).join("partitions.json"))
        .expect("fixture config should load")
}

pub(crate) fn load_fixture_checker(fixture: &str) -> PartitionChecker {
    PartitionChecker::from_config(load_fixture_config(fixture))
        .expect("fixture checker should build")
}

pub(crate) fn day_spec(table: &str) -> PartitionSpec {
    PartitionSpec::new(table, "day").expect("valid spec")
}

pub(crate) fn date_spec(table: &str, column: &str, max_days: Option<u32>) -> PartitionSpec {
    PartitionSpec::with_dates(table, column, "YYYY-mm-dd", max_days).expect("valid date spec")
}

/// `(table, kind)` per report; `None` marks a compliant table.
pub(crate) fn verdicts(reports: &[TableReport]) -> Vec<(&str, Option<ViolationKind>)> {
    reports
        .iter()
        .map(|r| {
            (
                r.table_name.as_str(),
                r.violation.as_ref().map(|v| v.kind),
            )
        })
        .collect()
}

pub(crate) fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    dir
}
