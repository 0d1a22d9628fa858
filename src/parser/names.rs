/// Return the identifier without surrounding quotes (`"x"`, `` `x` `` or `[x]`).
pub fn unquote_identifier(ident: &str) -> &str {
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if let Some(inner) = ident
            .strip_prefix(open)
            .and_then(|s| s.strip_suffix(close))
        {
            return inner;
        }
    }
    ident
}

/// Normalize an identifier for case-insensitive matching.
///
/// Trims whitespace, removes surrounding quotes on a single identifier,
/// and lowercases the result.
pub fn normalize_identifier(ident: &str) -> String {
    unquote_identifier(ident.trim()).to_lowercase()
}

/// Split a potentially qualified name (`catalog.schema.table`) into its parts.
///
/// Handles dots inside quoted identifiers, e.g. `"my.schema"."table.name"`.
/// Parts are trimmed and unquoted but keep their original case.
pub fn split_qualified_name(name: &str) -> Vec<String> {
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let mut parts = Vec::new();

    for (idx, ch) in name.char_indices() {
        match (quote, ch) {
            (None, '"' | '`') => quote = Some(ch),
            (None, '[') => quote = Some(']'),
            (Some(close), c) if c == close => quote = None,
            (None, '.') => {
                parts.push(unquote_identifier(name[start..idx].trim()).to_string());
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(unquote_identifier(name[start..].trim()).to_string());
    parts
}

/// Split and normalize a qualified name for case-insensitive comparison.
pub fn normalized_name_parts(name: &str) -> Vec<String> {
    split_qualified_name(name)
        .iter()
        .map(|part| part.to_lowercase())
        .collect()
}

/// Return the rightmost segment of a dotted name, unquoted, original case.
///
/// Examples:
/// - `"gridhive.fact.sales_history"` -> `"sales_history"`
/// - `"\"fact\".\"Sales\""` -> `"Sales"`
pub fn unqualified_name(name: &str) -> String {
    split_qualified_name(name.trim())
        .pop()
        .unwrap_or_default()
}

/// True when `suffix` equals the trailing parts of `parts`.
///
/// Both slices are expected to be normalized already.
pub fn ends_with_parts(parts: &[String], suffix: &[String]) -> bool {
    !suffix.is_empty() && suffix.len() <= parts.len() && parts[parts.len() - suffix.len()..] == *suffix
}

/// Number of trailing parts two qualified names agree on, or `None` when
/// they disagree somewhere within the shorter name.
pub fn shared_qualification(left: &[String], right: &[String]) -> Option<usize> {
    let agree = left
        .iter()
        .rev()
        .zip(right.iter().rev())
        .all(|(l, r)| l == r);
    agree.then(|| left.len().min(right.len()))
}
