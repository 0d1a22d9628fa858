use std::fmt::Write;

use crate::output::formatter::QueryResult;

/// Build a markdown report with a per-table summary and the violations found.
pub fn build_report(results: &[QueryResult]) -> String {
    let mut report = String::new();

    writeln!(report, "# sqlranger Partition Report").unwrap();
    writeln!(report).unwrap();

    writeln!(report, "## Summary").unwrap();
    writeln!(report).unwrap();
    writeln!(report, "| Source | Table | Column | Occurrences | Shape | Days | Verdict |").unwrap();
    writeln!(report, "|--------|-------|--------|-------------|-------|------|---------|").unwrap();

    for result in results {
        if let Some(error) = &result.error {
            writeln!(report, "| {} | - | - | - | - | - | error: {} |", result.source, escape(error))
                .unwrap();
            continue;
        }
        for table in &result.tables {
            let days = table
                .estimated_days
                .map_or_else(|| "-".to_string(), |days| days.to_string());
            let verdict = table
                .violation
                .as_ref()
                .map_or_else(|| "ok".to_string(), |v| v.kind.to_string());
            writeln!(
                report,
                "| {} | {} | {} | {} | {} | {} | {} |",
                result.source,
                table.table_name,
                table.column_name,
                table.occurrences,
                table.shape,
                days,
                verdict
            )
            .unwrap();
        }
    }

    let violations: Vec<_> = results
        .iter()
        .flat_map(|result| result.violations().map(move |v| (&result.source, v)))
        .collect();
    if !violations.is_empty() {
        writeln!(report).unwrap();
        writeln!(report, "## Violations").unwrap();
        writeln!(report).unwrap();

        for (source, violation) in violations {
            writeln!(
                report,
                "- **{}** `{}` in {}: {}",
                violation.kind, violation.table_name, source, violation.message
            )
            .unwrap();
        }
    }

    report
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
