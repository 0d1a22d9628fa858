/// Query results, text/JSON rendering and writing output files.
pub mod formatter;
/// Builds a Markdown partition report from query results.
pub mod report;
