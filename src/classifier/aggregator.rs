//! Rule evaluation and per-table aggregation.

use crate::classifier::partition_spec::PartitionSpec;
use crate::classifier::patterns::{
    AliasPolicy, Classification, RangeShape, TableReport, Violation, ViolationKind,
};

/// Classification of one table occurrence together with its spec.
#[derive(Debug, Clone)]
pub struct OccurrenceVerdict {
    /// Index of the matched spec.
    pub spec: usize,
    /// Select scope the occurrence belongs to.
    pub scope: usize,
    /// Discovery ordinal of the occurrence.
    pub ordinal: usize,
    /// Filter classification.
    pub classification: Classification,
    /// First rule that fired, if any.
    pub violation: Option<Violation>,
}

/// Run the rule chain against one classification; the first rule that fires wins.
pub fn evaluate(classification: &Classification, spec: &PartitionSpec) -> Option<Violation> {
    ViolationKind::PRECEDENCE
        .into_iter()
        .find(|kind| fires(*kind, classification, spec))
        .map(|kind| Violation {
            kind,
            message: message(kind, classification, spec),
            table_name: spec.unqualified_table_name(),
            estimated_days: (kind == ViolationKind::ExcessiveDateRange)
                .then_some(classification.estimated_days)
                .flatten(),
        })
}

fn fires(kind: ViolationKind, c: &Classification, spec: &PartitionSpec) -> bool {
    match kind {
        ViolationKind::MissingDayFilter => c.shape == RangeShape::Absent && !c.has_wrapped,
        ViolationKind::DayFilterWithFunction => c.shape == RangeShape::Absent && c.has_wrapped,
        ViolationKind::NoFiniteRange => c.shape == RangeShape::OpenEnded,
        ViolationKind::ExcessiveDateRange => {
            c.shape.is_finite()
                && matches!(
                    (spec.max_date_range_days(), c.estimated_days),
                    (Some(max), Some(days)) if days > max
                )
        }
    }
}

fn message(kind: ViolationKind, c: &Classification, spec: &PartitionSpec) -> String {
    let table = spec.unqualified_table_name();
    let column = spec.column_name();
    match kind {
        ViolationKind::MissingDayFilter if c.unfiltered_scope => format!(
            "Table '{table}' is used without a WHERE clause containing a '{column}' filter"
        ),
        ViolationKind::MissingDayFilter if c.disjunctive_only => format!(
            "Table '{table}' filters '{column}' only inside OR/NOT branches, which cannot guarantee partition pruning"
        ),
        ViolationKind::MissingDayFilter => {
            format!("Table '{table}' is used without a '{column}' column filter in WHERE clause")
        }
        ViolationKind::DayFilterWithFunction => format!(
            "Table '{table}' uses '{column}' column with a function, which disables partitioning. Use raw '{column}' column in comparisons."
        ),
        ViolationKind::NoFiniteRange => format!(
            "Table '{table}' does not have a finite date range on '{column}'. Use BETWEEN or combination of >= and <= operators."
        ),
        ViolationKind::ExcessiveDateRange => format!(
            "Table '{table}' has an excessive date range of approximately {} days (max: {})",
            c.estimated_days.unwrap_or_default(),
            spec.max_date_range_days().unwrap_or_default()
        ),
    }
}

/// Combine occurrence verdicts into one report per configured table,
/// ordered by each table's first discovery.
///
/// `policy` only arbitrates between occurrences that share a select scope.
/// Across scopes the first violating scope decides.
pub fn aggregate(
    verdicts: &[OccurrenceVerdict],
    specs: &[PartitionSpec],
    policy: AliasPolicy,
) -> Vec<TableReport> {
    let mut ordered: Vec<&OccurrenceVerdict> = verdicts.iter().collect();
    ordered.sort_by_key(|verdict| verdict.ordinal);

    // spec -> scope -> occurrences, each level in discovery order.
    let mut groups: Vec<(usize, Vec<ScopeGroup<'_>>)> = Vec::new();
    for verdict in ordered {
        let pos = groups
            .iter()
            .position(|(spec, _)| *spec == verdict.spec)
            .unwrap_or_else(|| {
                groups.push((verdict.spec, Vec::new()));
                groups.len() - 1
            });
        let scopes = &mut groups[pos].1;
        match scopes.iter_mut().find(|(scope, _)| *scope == verdict.scope) {
            Some((_, occurrences)) => occurrences.push(verdict),
            None => scopes.push((verdict.scope, vec![verdict])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(spec_idx, scopes)| {
            let deciding = across_scopes(&scopes, policy)?;
            let spec = &specs[spec_idx];
            Some(TableReport {
                table_name: spec.unqualified_table_name(),
                column_name: spec.column_name().to_string(),
                occurrences: scopes.iter().map(|(_, group)| group.len()).sum(),
                shape: deciding.classification.shape,
                estimated_days: deciding.classification.estimated_days,
                violation: deciding.violation.clone(),
            })
        })
        .collect()
}

type ScopeGroup<'a> = (usize, Vec<&'a OccurrenceVerdict>);

fn across_scopes<'a>(
    scopes: &[ScopeGroup<'a>],
    policy: AliasPolicy,
) -> Option<&'a OccurrenceVerdict> {
    let per_scope: Vec<&OccurrenceVerdict> = scopes
        .iter()
        .filter_map(|(_, group)| decide(group, policy))
        .collect();
    per_scope
        .iter()
        .find(|verdict| verdict.violation.is_some())
        .or(per_scope.first())
        .copied()
}

fn decide<'a>(group: &[&'a OccurrenceVerdict], policy: AliasPolicy) -> Option<&'a OccurrenceVerdict> {
    let first = group.first().copied()?;
    let chosen = match policy {
        AliasPolicy::Any => group.iter().find(|v| v.violation.is_none()),
        AliasPolicy::All => group.iter().find(|v| v.violation.is_some()),
        AliasPolicy::First => None,
    };
    Some(chosen.copied().unwrap_or(first))
}
