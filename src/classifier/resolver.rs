//! Bind table references to aliases and configured partition specs.

use crate::classifier::partition_spec::PartitionSpec;
use crate::parser::expr::ColumnRef;
use crate::parser::names::{
    ends_with_parts, normalize_identifier, normalized_name_parts, shared_qualification,
    unqualified_name,
};
use crate::parser::sql_parser::QueryTree;

/// One FROM/JOIN occurrence of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTableRef {
    /// Name columns use to reach this occurrence: the alias, or the written name.
    pub binding: String,
    /// Table name as written.
    pub written_name: String,
    /// Rightmost segment of the written name.
    pub unqualified_name: String,
    /// Index of the select scope the reference belongs to.
    pub scope: usize,
    /// Discovery ordinal across the whole text.
    pub ordinal: usize,
    /// Index of the matched spec, if any.
    pub spec: Option<usize>,
    alias: Option<String>,
    written_parts: Vec<String>,
}

/// All table occurrences of a query, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct TableResolution {
    refs: Vec<ResolvedTableRef>,
}

impl TableResolution {
    /// Every occurrence, matched or not.
    pub fn refs(&self) -> &[ResolvedTableRef] {
        &self.refs
    }

    /// Occurrences that matched a spec, as `(occurrence index, spec index)`.
    pub fn matched(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.refs
            .iter()
            .enumerate()
            .filter_map(|(idx, table)| table.spec.map(|spec| (idx, spec)))
    }

    /// True when no occurrence matched a spec.
    pub fn is_unmatched(&self) -> bool {
        self.matched().next().is_none()
    }

    fn in_scope(&self, scope: usize) -> impl Iterator<Item = (usize, &ResolvedTableRef)> + '_ {
        self.refs
            .iter()
            .enumerate()
            .filter(move |(_, table)| table.scope == scope)
    }

    /// Resolve a column reference in `scope` to an occurrence index.
    ///
    /// Returns `None` when the reference is unknown or ambiguous.
    pub fn resolve_column(
        &self,
        scope: usize,
        column: &ColumnRef,
        specs: &[PartitionSpec],
    ) -> Option<usize> {
        let candidates: Vec<usize> = match &column.qualifier {
            Some(qualifier) => {
                let qualifier_parts = normalized_name_parts(qualifier);
                self.in_scope(scope)
                    .filter(|(_, table)| match &table.alias {
                        Some(alias) => {
                            qualifier_parts.len() == 1
                                && qualifier_parts[0] == normalize_identifier(alias)
                        }
                        None => ends_with_parts(&table.written_parts, &qualifier_parts),
                    })
                    .map(|(idx, _)| idx)
                    .collect()
            }
            None => {
                let all: Vec<usize> = self.in_scope(scope).map(|(idx, _)| idx).collect();
                if all.len() == 1 {
                    all
                } else {
                    self.in_scope(scope)
                        .filter(|(_, table)| {
                            table
                                .spec
                                .is_some_and(|spec| specs[spec].is_partition_column(&column.name))
                        })
                        .map(|(idx, _)| idx)
                        .collect()
                }
            }
        };

        match candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// Resolve every table reference of `tree` against `specs`.
pub fn resolve_tables(tree: &QueryTree, specs: &[PartitionSpec]) -> TableResolution {
    let refs = tree
        .table_refs()
        .map(|(scope, table)| {
            let written_parts = normalized_name_parts(&table.written_name);
            let spec = if table.is_cte {
                None
            } else {
                match_spec(&written_parts, specs)
            };
            ResolvedTableRef {
                binding: table
                    .alias
                    .clone()
                    .unwrap_or_else(|| table.written_name.clone()),
                written_name: table.written_name.clone(),
                unqualified_name: unqualified_name(&table.written_name),
                scope,
                ordinal: table.ordinal,
                spec,
                alias: table.alias.clone(),
                written_parts,
            }
        })
        .collect();
    TableResolution { refs }
}

/// Find the spec a written table name refers to.
///
/// `written_parts` must be normalized (see [`normalized_name_parts`]).
pub fn match_spec(written_parts: &[String], specs: &[PartitionSpec]) -> Option<usize> {
    if let Some(exact) = specs
        .iter()
        .position(|spec| spec.normalized_parts() == written_parts)
    {
        return Some(exact);
    }

    let last = written_parts.last()?;
    let same_name: Vec<usize> = specs
        .iter()
        .enumerate()
        .filter(|(_, spec)| spec.normalized_parts().last() == Some(last))
        .map(|(idx, _)| idx)
        .collect();

    let mut best: Option<(usize, usize)> = None;
    for &idx in &same_name {
        let Some(shared) = shared_qualification(specs[idx].normalized_parts(), written_parts)
        else {
            continue;
        };
        // Strictly greater keeps the first configured spec on ties.
        if best.map_or(true, |(_, best_shared)| shared > best_shared) {
            best = Some((idx, shared));
        }
    }
    if let Some((idx, _)) = best {
        return Some(idx);
    }

    match same_name.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sql_parser::{parse_query, DEFAULT_DIALECT};

    fn spec(table: &str) -> PartitionSpec {
        PartitionSpec::new(table, "day").expect("valid spec")
    }

    fn parts(name: &str) -> Vec<String> {
        normalized_name_parts(name)
    }

    fn column(qualifier: Option<&str>, name: &str) -> ColumnRef {
        ColumnRef {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
        }
    }

    #[test]
    fn exact_names_match_first() {
        let specs = vec![spec("sales"), spec("fact.sales")];
        assert_eq!(match_spec(&parts("fact.sales"), &specs), Some(1));
        assert_eq!(match_spec(&parts("SALES"), &specs), Some(0));
    }

    #[test]
    fn most_specific_compatible_qualification_wins() {
        let specs = vec![spec("sales"), spec("fact.sales"), spec("other.sales")];
        assert_eq!(match_spec(&parts("gridhive.fact.sales"), &specs), Some(1));

        let specs = vec![spec("gridhive.fact.sales")];
        assert_eq!(match_spec(&parts("fact.sales"), &specs), Some(0));
        assert_eq!(match_spec(&parts("sales"), &specs), Some(0));
    }

    #[test]
    fn a_lone_spec_matches_despite_differing_qualification() {
        let specs = vec![spec("gridhive.fact.sales")];
        assert_eq!(match_spec(&parts("archive.sales"), &specs), Some(0));

        let specs = vec![spec("fact.sales"), spec("dim.sales")];
        assert_eq!(match_spec(&parts("archive.sales"), &specs), None);
        assert_eq!(match_spec(&parts("products"), &specs), None);
    }

    #[test]
    fn resolves_aliases_and_unaliased_suffixes() {
        let tree = parse_query(
            "SELECT * FROM gridhive.fact.sales_history s JOIN dim.products ON s.id = products.id",
            DEFAULT_DIALECT,
        )
        .expect("parses");
        let specs = vec![spec("sales_history")];
        let resolution = resolve_tables(&tree, &specs);

        assert_eq!(resolution.refs().len(), 2);
        assert_eq!(resolution.refs()[0].binding, "s");
        assert_eq!(resolution.refs()[0].unqualified_name, "sales_history");
        assert_eq!(resolution.refs()[1].binding, "dim.products");
        assert_eq!(resolution.matched().collect::<Vec<_>>(), vec![(0, 0)]);

        assert_eq!(resolution.resolve_column(0, &column(Some("s"), "day"), &specs), Some(0));
        assert_eq!(
            resolution.resolve_column(0, &column(Some("products"), "day"), &specs),
            Some(1)
        );
        assert_eq!(
            resolution.resolve_column(0, &column(Some("dim.products"), "day"), &specs),
            Some(1)
        );
        // Aliased tables are not reachable through their written name.
        assert_eq!(
            resolution.resolve_column(0, &column(Some("sales_history"), "day"), &specs),
            None
        );
    }

    #[test]
    fn unqualified_columns_need_a_unique_owner() {
        let tree = parse_query(
            "SELECT * FROM events e JOIN logs l ON e.id = l.id JOIN events e2 ON e.id = e2.id",
            DEFAULT_DIALECT,
        )
        .expect("parses");
        let specs = vec![spec("logs")];
        let resolution = resolve_tables(&tree, &specs);
        assert_eq!(resolution.resolve_column(0, &column(None, "day"), &specs), Some(1));

        let specs = vec![spec("events")];
        let resolution = resolve_tables(&tree, &specs);
        assert_eq!(resolution.resolve_column(0, &column(None, "day"), &specs), None);
    }

    #[test]
    fn cte_references_are_never_matched() {
        let tree = parse_query(
            "WITH sales AS (SELECT * FROM raw_sales) SELECT * FROM sales",
            DEFAULT_DIALECT,
        )
        .expect("parses");
        let specs = vec![spec("sales")];
        let resolution = resolve_tables(&tree, &specs);
        assert!(resolution.is_unmatched());
        assert_eq!(resolution.refs().len(), 2);
    }
}
