use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of partition-usage violation, in rule precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// No usable predicate on the partition column.
    MissingDayFilter,
    /// The partition column is only filtered through a function call.
    DayFilterWithFunction,
    /// The partition column is not bounded on both sides.
    NoFiniteRange,
    /// The bounded range is wider than the configured maximum.
    ExcessiveDateRange,
}

impl ViolationKind {
    /// Rules in the order they are evaluated; the first that fires wins.
    pub const PRECEDENCE: [ViolationKind; 4] = [
        ViolationKind::MissingDayFilter,
        ViolationKind::DayFilterWithFunction,
        ViolationKind::NoFiniteRange,
        ViolationKind::ExcessiveDateRange,
    ];

    /// Stable upper-case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::MissingDayFilter => "MISSING_DAY_FILTER",
            ViolationKind::DayFilterWithFunction => "DAY_FILTER_WITH_FUNCTION",
            ViolationKind::NoFiniteRange => "NO_FINITE_RANGE",
            ViolationKind::ExcessiveDateRange => "EXCESSIVE_DATE_RANGE",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed partition check for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Which rule fired.
    pub kind: ViolationKind,
    /// Human-readable explanation.
    pub message: String,
    /// Unqualified configured table name.
    pub table_name: String,
    /// Estimated span in days; only set for [`ViolationKind::ExcessiveDateRange`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.table_name, self.message)
    }
}

/// Operator of an extracted partition predicate, normalized so the column is on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateOp {
    /// `col = v`
    Eq,
    /// `col BETWEEN lo AND hi`
    Between,
    /// `col >= v`
    GtEq,
    /// `col <= v`
    LtEq,
    /// `col > v`
    Gt,
    /// `col < v`
    Lt,
    /// `col IN (v, ...)`
    In,
    /// Anything else (`<>`, `NOT BETWEEN`, `NOT IN`, wrapped comparisons).
    Other,
}

/// Clause a predicate was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOrigin {
    /// The scope's WHERE clause.
    Where,
    /// A JOIN ... ON condition.
    JoinOn,
}

/// One filter condition on a partition column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Index of the resolved table occurrence.
    pub occurrence: usize,
    /// Normalized operator.
    pub op: PredicateOp,
    /// Operand literal text, in source order; `None` for non-literal constants.
    pub operands: Vec<Option<String>>,
    /// The column is nested inside a function (or other expression).
    pub wrapped: bool,
    /// Where the predicate was found.
    pub origin: FilterOrigin,
}

/// Shape of the partition filter on one table occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeShape {
    /// Equality against a single value.
    Point,
    /// `BETWEEN` with two bounds.
    Explicit,
    /// Separate lower and upper bounds.
    Conjoined,
    /// One bound only, or an operator that does not bound the column.
    OpenEnded,
    /// No unwrapped predicate at all.
    Absent,
}

impl RangeShape {
    /// True for point and range shapes.
    pub fn is_finite(self) -> bool {
        matches!(
            self,
            RangeShape::Point | RangeShape::Explicit | RangeShape::Conjoined
        )
    }
}

impl fmt::Display for RangeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeShape::Point => write!(f, "point"),
            RangeShape::Explicit => write!(f, "explicit range"),
            RangeShape::Conjoined => write!(f, "conjoined range"),
            RangeShape::OpenEnded => write!(f, "open-ended"),
            RangeShape::Absent => write!(f, "absent"),
        }
    }
}

/// Classification of the partition filter on one table occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Shape of the unwrapped conjunctive predicates.
    pub shape: RangeShape,
    /// A conjunctive predicate wraps the column in a function.
    pub has_wrapped: bool,
    /// Predicates exist but only under OR/NOT.
    pub disjunctive_only: bool,
    /// The occurrence's scope has no WHERE and no JOIN condition.
    pub unfiltered_scope: bool,
    /// Estimated inclusive span in days, when estimable.
    pub estimated_days: Option<u32>,
}

/// How verdicts of several occurrences of the same table are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasPolicy {
    /// Compliant when at least one occurrence is compliant.
    #[default]
    Any,
    /// Every occurrence must be compliant.
    All,
    /// Only the first occurrence in discovery order counts.
    First,
}

impl fmt::Display for AliasPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasPolicy::Any => write!(f, "any"),
            AliasPolicy::All => write!(f, "all"),
            AliasPolicy::First => write!(f, "first"),
        }
    }
}

impl std::str::FromStr for AliasPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(AliasPolicy::Any),
            "all" => Ok(AliasPolicy::All),
            "first" => Ok(AliasPolicy::First),
            _ => Err(format!("Invalid alias policy: {s}")),
        }
    }
}

/// Verdict for one configured table referenced by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Unqualified configured table name.
    pub table_name: String,
    /// Partition column name as configured.
    pub column_name: String,
    /// Number of FROM/JOIN occurrences of the table.
    pub occurrences: usize,
    /// Shape of the deciding occurrence.
    pub shape: RangeShape,
    /// Estimated span of the deciding occurrence, when estimable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
    /// The violation, or `None` when compliant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
}

impl TableReport {
    /// True when no rule fired.
    pub fn is_compliant(&self) -> bool {
        self.violation.is_none()
    }
}
