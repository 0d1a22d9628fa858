//! Classify an occurrence's partition predicates and estimate the date span.

use chrono::NaiveDate;
use tracing::debug;

use crate::classifier::extractor::OccurrenceFilters;
use crate::classifier::partition_spec::DateSemantics;
use crate::classifier::patterns::{Classification, Predicate, PredicateOp, RangeShape};

/// Options that change how bounds are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeOptions {
    /// Treat `>` and `<` as exclusive lower and upper bounds.
    pub strict_bounds_are_finite: bool,
}

#[derive(Debug, Clone, Copy)]
enum Bound<'a> {
    Inclusive(Option<&'a str>),
    Exclusive(Option<&'a str>),
    /// A date already parsed, e.g. the extremes of an IN list.
    Date(NaiveDate),
}

/// Classify the filters of one table occurrence.
pub fn classify(
    filters: &OccurrenceFilters,
    unfiltered_scope: bool,
    dates: Option<&DateSemantics>,
    options: RangeOptions,
) -> Classification {
    let unwrapped: Vec<&Predicate> = filters.conjunctive.iter().filter(|p| !p.wrapped).collect();
    let has_wrapped = filters.conjunctive.iter().any(|p| p.wrapped);

    let point = unwrapped.iter().find(|p| p.op == PredicateOp::Eq);
    let mut explicit = false;
    let mut lower = Vec::new();
    let mut upper = Vec::new();

    for predicate in &unwrapped {
        let first = predicate.operands.first().and_then(Option::as_deref);
        match predicate.op {
            PredicateOp::Between => {
                explicit = true;
                lower.push(Bound::Inclusive(first));
                upper.push(Bound::Inclusive(
                    predicate.operands.get(1).and_then(Option::as_deref),
                ));
            }
            PredicateOp::In => {
                if let Some((min, max)) = dates.and_then(|d| in_list_extremes(predicate, d)) {
                    explicit = true;
                    lower.push(Bound::Date(min));
                    upper.push(Bound::Date(max));
                }
            }
            PredicateOp::GtEq => lower.push(Bound::Inclusive(first)),
            PredicateOp::LtEq => upper.push(Bound::Inclusive(first)),
            PredicateOp::Gt if options.strict_bounds_are_finite => {
                lower.push(Bound::Exclusive(first));
            }
            PredicateOp::Lt if options.strict_bounds_are_finite => {
                upper.push(Bound::Exclusive(first));
            }
            _ => {}
        }
    }

    let shape = if point.is_some() {
        RangeShape::Point
    } else if explicit {
        RangeShape::Explicit
    } else if !lower.is_empty() && !upper.is_empty() {
        RangeShape::Conjoined
    } else if !unwrapped.is_empty() {
        RangeShape::OpenEnded
    } else {
        RangeShape::Absent
    };

    let estimated_days = dates.and_then(|dates| match shape {
        RangeShape::Point => {
            let literal = point.and_then(|p| p.operands.first()).and_then(Option::as_deref)?;
            dates.pattern.parse_date(literal).ok().map(|_| 1)
        }
        RangeShape::Explicit | RangeShape::Conjoined => estimate_span(&lower, &upper, dates),
        RangeShape::OpenEnded | RangeShape::Absent => None,
    });

    Classification {
        shape,
        has_wrapped,
        disjunctive_only: filters.conjunctive.is_empty() && filters.disjunctive > 0,
        unfiltered_scope,
        estimated_days,
    }
}

/// Earliest and latest date of an IN list, if every item parses.
fn in_list_extremes(predicate: &Predicate, dates: &DateSemantics) -> Option<(NaiveDate, NaiveDate)> {
    let parsed = predicate
        .operands
        .iter()
        .map(|operand| dates.pattern.parse_date(operand.as_deref()?).ok())
        .collect::<Option<Vec<NaiveDate>>>()?;
    Some((*parsed.iter().min()?, *parsed.iter().max()?))
}

/// Inclusive day count of the intersection of all bounds.
fn estimate_span(lower: &[Bound<'_>], upper: &[Bound<'_>], dates: &DateSemantics) -> Option<u32> {
    let start = lower
        .iter()
        .map(|bound| resolve_bound(*bound, dates, NaiveDate::succ_opt))
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()?;
    let end = upper
        .iter()
        .map(|bound| resolve_bound(*bound, dates, NaiveDate::pred_opt))
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .min()?;

    if end < start {
        debug!(%start, %end, "date range bounds are reversed, skipping estimation");
        return None;
    }
    u32::try_from((end - start).num_days() + 1).ok()
}

fn resolve_bound(
    bound: Bound<'_>,
    dates: &DateSemantics,
    exclusive_step: fn(&NaiveDate) -> Option<NaiveDate>,
) -> Option<NaiveDate> {
    match bound {
        Bound::Date(date) => Some(date),
        Bound::Inclusive(text) => parse(text, dates),
        Bound::Exclusive(text) => exclusive_step(&parse(text, dates)?),
    }
}

fn parse(text: Option<&str>, dates: &DateSemantics) -> Option<NaiveDate> {
    match dates.pattern.parse_date(text?) {
        Ok(date) => Some(date),
        Err(err) => {
            debug!(%err, "bound is not a date, skipping estimation");
            None
        }
    }
}
