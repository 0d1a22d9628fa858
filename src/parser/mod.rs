/// Token date patterns and literal-to-date parsing.
pub mod date_pattern;
/// Parser-independent expression tree and visitor.
pub mod expr;
/// Identifier and table-name normalization helpers (qualified names, quoted identifiers).
pub mod names;
/// `sqlparser` front end: parses query text and lowers it into select scopes.
pub mod sql_parser;
