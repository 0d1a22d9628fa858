//! Collect partition predicates from WHERE and JOIN ON clauses.

use crate::classifier::partition_spec::PartitionSpec;
use crate::classifier::patterns::{FilterOrigin, Predicate, PredicateOp};
use crate::classifier::resolver::TableResolution;
use crate::parser::expr::{CompareOp, Expr, LiteralKind, LogicalOp};
use crate::parser::sql_parser::QueryTree;

/// Value-side functions whose first argument is read as a date literal.
const DATE_CONSTRUCTORS: &[&str] = &["date", "from_iso8601_date", "to_date", "cast"];

/// Partition predicates found for one table occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccurrenceFilters {
    /// Predicates reachable through AND-only paths.
    pub conjunctive: Vec<Predicate>,
    /// Predicates found only under OR or NOT.
    pub disjunctive: usize,
}

/// Extract predicates for every occurrence of `resolution`, indexed like
/// [`TableResolution::refs`].
pub fn extract_predicates(
    tree: &QueryTree,
    resolution: &TableResolution,
    specs: &[PartitionSpec],
) -> Vec<OccurrenceFilters> {
    let mut out = vec![OccurrenceFilters::default(); resolution.refs().len()];
    if resolution.is_unmatched() {
        return out;
    }

    for (scope_idx, scope) in tree.scopes.iter().enumerate() {
        let ctx = ScopeContext {
            scope: scope_idx,
            resolution,
            specs,
        };
        if let Some(filter) = &scope.filter {
            ctx.visit(filter, true, FilterOrigin::Where, &mut out);
        }
        for on in &scope.join_filters {
            ctx.visit(on, true, FilterOrigin::JoinOn, &mut out);
        }
    }
    out
}

struct ScopeContext<'a> {
    scope: usize,
    resolution: &'a TableResolution,
    specs: &'a [PartitionSpec],
}

impl ScopeContext<'_> {
    fn visit(
        &self,
        expr: &Expr,
        conjunctive: bool,
        origin: FilterOrigin,
        out: &mut [OccurrenceFilters],
    ) {
        match expr {
            Expr::Nested(inner) => self.visit(inner, conjunctive, origin, out),
            Expr::Logical {
                op: LogicalOp::And,
                left,
                right,
            } => {
                self.visit(left, conjunctive, origin, out);
                self.visit(right, conjunctive, origin, out);
            }
            Expr::Logical {
                op: LogicalOp::Or,
                left,
                right,
            } => {
                self.visit(left, false, origin, out);
                self.visit(right, false, origin, out);
            }
            Expr::Not(inner) => self.visit(inner, false, origin, out),
            Expr::Compare { .. } | Expr::Between { .. } | Expr::InList { .. } => {
                let Some(predicate) = self.predicate(expr, origin) else {
                    return;
                };
                let filters = &mut out[predicate.occurrence];
                if conjunctive {
                    filters.conjunctive.push(predicate);
                } else {
                    filters.disjunctive += 1;
                }
            }
            _ => {}
        }
    }

    /// The matched occurrence whose partition column appears in `side`, and
    /// whether the column is wrapped.
    fn partition_side(&self, side: &Expr) -> Option<(usize, bool)> {
        side.column_refs().into_iter().find_map(|column| {
            let occurrence = self
                .resolution
                .resolve_column(self.scope, column, self.specs)?;
            let spec = self.resolution.refs()[occurrence].spec?;
            self.specs[spec]
                .is_partition_column(&column.name)
                .then(|| (occurrence, side.as_bare_column().is_none()))
        })
    }

    fn predicate(&self, expr: &Expr, origin: FilterOrigin) -> Option<Predicate> {
        let (occurrence, wrapped, op, operands) = match expr {
            Expr::Compare { op, left, right } => {
                if let (Some((occ, wrapped)), true) =
                    (self.partition_side(left), right.is_constant())
                {
                    (occ, wrapped, compare_predicate_op(*op), vec![right.as_ref()])
                } else if let (Some((occ, wrapped)), true) =
                    (self.partition_side(right), left.is_constant())
                {
                    (
                        occ,
                        wrapped,
                        compare_predicate_op(op.flip()),
                        vec![left.as_ref()],
                    )
                } else {
                    return None;
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let (occ, wrapped) = self.partition_side(expr)?;
                if !low.is_constant() || !high.is_constant() {
                    return None;
                }
                let op = if *negated {
                    PredicateOp::Other
                } else {
                    PredicateOp::Between
                };
                (occ, wrapped, op, vec![low.as_ref(), high.as_ref()])
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let (occ, wrapped) = self.partition_side(expr)?;
                if !list.iter().all(Expr::is_constant) {
                    return None;
                }
                let op = if *negated {
                    PredicateOp::Other
                } else {
                    PredicateOp::In
                };
                (occ, wrapped, op, list.iter().collect())
            }
            _ => return None,
        };

        Some(Predicate {
            occurrence,
            op,
            operands: operands.into_iter().map(literal_text).collect(),
            wrapped,
            origin,
        })
    }
}

fn compare_predicate_op(op: CompareOp) -> PredicateOp {
    match op {
        CompareOp::Eq => PredicateOp::Eq,
        CompareOp::GtEq => PredicateOp::GtEq,
        CompareOp::LtEq => PredicateOp::LtEq,
        CompareOp::Gt => PredicateOp::Gt,
        CompareOp::Lt => PredicateOp::Lt,
        CompareOp::NotEq => PredicateOp::Other,
    }
}

/// Text of a literal operand, seeing through date constructor calls.
fn literal_text(expr: &Expr) -> Option<String> {
    match expr.unnested() {
        Expr::Literal(literal) => match literal.kind {
            LiteralKind::String | LiteralKind::Number | LiteralKind::Typed => {
                Some(literal.text.clone())
            }
            LiteralKind::Null | LiteralKind::Other => None,
        },
        Expr::Function { name, args } if DATE_CONSTRUCTORS.contains(&name.as_str()) => {
            args.first().and_then(literal_text)
        }
        _ => None,
    }
}
