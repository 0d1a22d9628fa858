use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::classifier::patterns::{TableReport, Violation};
use crate::output::report;

/// Result of checking one query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Where the text came from (file path or `<stdin>`).
    pub source: String,
    /// One entry per configured table the query references.
    pub tables: Vec<TableReport>,
    /// Parse error, when strict checking rejected the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// Violations in table discovery order.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.tables.iter().filter_map(|table| table.violation.as_ref())
    }
}

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per violation.
    #[default]
    Text,
    /// Pretty-printed JSON array of [`QueryResult`].
    Json,
    /// Markdown report.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// True when any result carries a violation.
pub fn has_violations(results: &[QueryResult]) -> bool {
    results.iter().any(|result| result.violations().next().is_some())
}

/// True when any result carries an error.
pub fn has_errors(results: &[QueryResult]) -> bool {
    results.iter().any(|result| result.error.is_some())
}

/// Render results in the requested format.
pub fn render(results: &[QueryResult], format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Text => Ok(render_text(results)),
        OutputFormat::Json => serde_json::to_string_pretty(results)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .map_err(|e| format!("Failed to serialize results: {e}")),
        OutputFormat::Markdown => Ok(report::build_report(results)),
    }
}

fn render_text(results: &[QueryResult]) -> String {
    let mut out = String::new();
    for result in results {
        if let Some(error) = &result.error {
            out.push_str(&format!("{}: error: {error}\n", result.source));
            continue;
        }
        let mut clean = true;
        for violation in result.violations() {
            clean = false;
            out.push_str(&format!(
                "{}: {} {}: {}\n",
                result.source, violation.kind, violation.table_name, violation.message
            ));
        }
        if clean {
            out.push_str(&format!(
                "{}: ok ({} partitioned table(s) checked)\n",
                result.source,
                result.tables.len()
            ));
        }
    }
    out
}

/// Write rendered output to `path`, creating parent directories.
pub fn write_output(path: &Path, content: &str) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("Output path must not be empty".to_string());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create output directory: {e}"))?;
    }
    std::fs::write(path, content).map_err(|e| format!("Failed to write {}: {e}", path.display()))
}
