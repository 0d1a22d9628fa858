//! Parse query text with `sqlparser` and lower it into a [`QueryTree`].

use std::collections::HashSet;

use sqlparser::ast::{
    Array, BinaryOperator, Expr as SqlExpr, FunctionArguments, JoinConstraint, JoinOperator,
    Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator,
    Value,
};
use sqlparser::dialect::{dialect_from_str, Dialect};
use sqlparser::parser::{Parser, ParserError};
use thiserror::Error;

use crate::parser::expr::{ColumnRef, CompareOp, Expr, Literal, LiteralKind, LogicalOp};
use crate::parser::names::normalize_identifier;

/// Dialect used when none is configured.
pub const DEFAULT_DIALECT: &str = "generic";

/// Query text that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// The SQL parser rejected the text.
    #[error("SQL parse error: {0}")]
    Syntax(String),
    /// The configured dialect name is not known to the parser.
    #[error("unknown SQL dialect '{0}'")]
    UnknownDialect(String),
}

/// A table reference found in a FROM or JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Table name as written in the query.
    pub written_name: String,
    /// Alias bound to the table, if any.
    pub alias: Option<String>,
    /// Position of the reference in discovery order across the whole text.
    pub ordinal: usize,
    /// The name refers to a CTE of an enclosing `WITH`, not a stored table.
    pub is_cte: bool,
}

/// One `SELECT` block: its table references and filter-bearing clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectScope {
    /// FROM/JOIN table references in the order they appear.
    pub tables: Vec<TableRef>,
    /// `ON` conditions of the scope's joins.
    pub join_filters: Vec<Expr>,
    /// `WHERE` root.
    pub filter: Option<Expr>,
}

impl SelectScope {
    /// True when the scope has neither a WHERE clause nor a JOIN condition.
    pub fn is_unfiltered(&self) -> bool {
        self.filter.is_none() && self.join_filters.is_empty()
    }
}

/// Lowered form of every query block in a SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTree {
    /// Select scopes; nested scopes (CTEs, subqueries) get their own entry.
    pub scopes: Vec<SelectScope>,
}

impl QueryTree {
    /// All table references with their scope index.
    pub fn table_refs(&self) -> impl Iterator<Item = (usize, &TableRef)> {
        self.scopes
            .iter()
            .enumerate()
            .flat_map(|(idx, scope)| scope.tables.iter().map(move |table| (idx, table)))
    }
}

/// Check that `name` is a dialect the parser knows.
pub fn validate_dialect(name: &str) -> Result<(), ParseFailure> {
    resolve_dialect(name).map(|_| ())
}

fn resolve_dialect(name: &str) -> Result<Box<dyn Dialect>, ParseFailure> {
    dialect_from_str(name).ok_or_else(|| ParseFailure::UnknownDialect(name.to_string()))
}

/// Parse `sql` using the named dialect and lower all statements.
pub fn parse_query(sql: &str, dialect: &str) -> Result<QueryTree, ParseFailure> {
    let dialect = resolve_dialect(dialect)?;
    let statements = Parser::parse_sql(dialect.as_ref(), sql)
        .map_err(|e| ParseFailure::Syntax(syntax_message(e)))?;

    let mut lowerer = Lowerer::default();
    for statement in &statements {
        lowerer.statement(statement);
    }
    Ok(QueryTree {
        scopes: lowerer.scopes,
    })
}

#[derive(Default)]
struct Lowerer {
    scopes: Vec<SelectScope>,
    next_ordinal: usize,
    cte_names: Vec<HashSet<String>>,
}

impl Lowerer {
    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => {
                if let Some(source) = &insert.source {
                    self.query(source);
                }
            }
            Statement::CreateTable(create) => {
                if let Some(query) = &create.query {
                    self.query(query);
                }
            }
            Statement::Explain { statement, .. } => self.statement(statement),
            _ => {}
        }
    }

    fn query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            self.cte_names.push(HashSet::new());
            for cte in &with.cte_tables {
                // Register before lowering so recursive CTEs see their own name.
                if let Some(frame) = self.cte_names.last_mut() {
                    frame.insert(normalize_identifier(&cte.alias.name.value));
                }
                self.query(&cte.query);
            }
        }

        self.set_expr(&query.body);

        if query.with.is_some() {
            self.cte_names.pop();
        }
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.select(select),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.set_expr(left);
                self.set_expr(right);
            }
            _ => {}
        }
    }

    fn select(&mut self, select: &Select) {
        let idx = self.scopes.len();
        self.scopes.push(SelectScope::default());

        // Projection and HAVING are lowered only to discover nested subqueries.
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.expr(expr);
                }
                _ => {}
            }
        }

        for from in &select.from {
            self.table_with_joins(from, idx);
        }

        let filter = select.selection.as_ref().map(|expr| self.expr(expr));
        self.scopes[idx].filter = filter;

        if let Some(having) = &select.having {
            self.expr(having);
        }
    }

    fn table_with_joins(&mut self, twj: &TableWithJoins, idx: usize) {
        self.table_factor(&twj.relation, idx);
        for join in &twj.joins {
            self.table_factor(&join.relation, idx);
            if let Some(on) = join_on_expr(&join.join_operator) {
                let lowered = self.expr(on);
                self.scopes[idx].join_filters.push(lowered);
            }
        }
    }

    fn table_factor(&mut self, factor: &TableFactor, idx: usize) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let written_name = name.to_string();
                let is_cte = !written_name.contains('.')
                    && self
                        .cte_names
                        .iter()
                        .any(|frame| frame.contains(&normalize_identifier(&written_name)));
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.scopes[idx].tables.push(TableRef {
                    written_name,
                    alias: alias.as_ref().map(|a| a.name.value.clone()),
                    ordinal,
                    is_cte,
                });
            }
            TableFactor::Derived { subquery, .. } => self.query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins, idx),
            _ => {}
        }
    }

    fn exprs(&mut self, exprs: &[SqlExpr]) -> Vec<Expr> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn boxed(&mut self, expr: &SqlExpr) -> Box<Expr> {
        Box::new(self.expr(expr))
    }

    fn expr(&mut self, expr: &SqlExpr) -> Expr {
        match expr {
            SqlExpr::Identifier(ident) => Expr::Column(ColumnRef {
                qualifier: None,
                name: ident.value.clone(),
            }),
            SqlExpr::CompoundIdentifier(parts) => {
                let Some((last, qualifier)) = parts.split_last() else {
                    return Expr::Other(Vec::new());
                };
                let qualifier = qualifier
                    .iter()
                    .map(|ident| ident.value.as_str())
                    .collect::<Vec<_>>()
                    .join(".");
                Expr::Column(ColumnRef {
                    qualifier: (!qualifier.is_empty()).then_some(qualifier),
                    name: last.value.clone(),
                })
            }
            SqlExpr::Value(v) => Expr::Literal(literal_from_value(&v.value)),
            SqlExpr::TypedString(ts) => Expr::Literal(Literal {
                text: strip_single_quotes(&ts.value.to_string()),
                kind: LiteralKind::Typed,
            }),
            SqlExpr::Nested(inner) => Expr::Nested(self.boxed(inner)),
            SqlExpr::BinaryOp { left, op, right } => {
                let left = self.boxed(left);
                let right = self.boxed(right);
                if let Some(op) = logical_op(op) {
                    Expr::Logical { op, left, right }
                } else if let Some(op) = compare_op(op) {
                    Expr::Compare { op, left, right }
                } else {
                    Expr::Other(vec![*left, *right])
                }
            }
            SqlExpr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => Expr::Not(self.boxed(expr)),
            SqlExpr::UnaryOp { expr, .. } => Expr::Other(vec![self.expr(expr)]),
            SqlExpr::Between {
                expr,
                negated,
                low,
                high,
            } => Expr::Between {
                expr: self.boxed(expr),
                low: self.boxed(low),
                high: self.boxed(high),
                negated: *negated,
            },
            SqlExpr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: self.boxed(expr),
                list: self.exprs(list),
                negated: *negated,
            },
            SqlExpr::Function(func) => {
                let args = match &func.args {
                    FunctionArguments::List(list) => list
                        .args
                        .iter()
                        .filter_map(function_arg_expr)
                        .map(|arg| self.expr(arg))
                        .collect(),
                    FunctionArguments::Subquery(query) => {
                        self.query(query);
                        vec![Expr::Subquery]
                    }
                    FunctionArguments::None => Vec::new(),
                };
                Expr::Function {
                    name: func.name.to_string().to_lowercase(),
                    args,
                }
            }
            SqlExpr::Cast { expr, .. } => Expr::Function {
                name: "cast".to_string(),
                args: vec![self.expr(expr)],
            },
            SqlExpr::Extract { expr, .. } => Expr::Function {
                name: "extract".to_string(),
                args: vec![self.expr(expr)],
            },
            SqlExpr::AtTimeZone {
                timestamp,
                time_zone,
            } => Expr::Function {
                name: "at_time_zone".to_string(),
                args: vec![self.expr(timestamp), self.expr(time_zone)],
            },
            SqlExpr::Subquery(query) | SqlExpr::Exists {
                subquery: query, ..
            } => {
                self.query(query);
                Expr::Subquery
            }
            SqlExpr::InSubquery { expr, subquery, .. } => {
                let lowered = self.expr(expr);
                self.query(subquery);
                Expr::Other(vec![lowered, Expr::Subquery])
            }
            SqlExpr::IsNull(inner)
            | SqlExpr::IsNotNull(inner)
            | SqlExpr::IsTrue(inner)
            | SqlExpr::IsFalse(inner)
            | SqlExpr::IsNotTrue(inner)
            | SqlExpr::IsNotFalse(inner) => Expr::Other(vec![self.expr(inner)]),
            SqlExpr::Like { expr, pattern, .. } | SqlExpr::ILike { expr, pattern, .. } => {
                Expr::Other(vec![self.expr(expr), self.expr(pattern)])
            }
            SqlExpr::IsDistinctFrom(left, right) | SqlExpr::IsNotDistinctFrom(left, right) => {
                Expr::Other(vec![self.expr(left), self.expr(right)])
            }
            SqlExpr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                let mut args = vec![self.expr(expr)];
                args.extend(self.optional(substring_from));
                args.extend(self.optional(substring_for));
                Expr::Function {
                    name: "substring".to_string(),
                    args,
                }
            }
            SqlExpr::Trim {
                expr,
                trim_what,
                trim_characters,
                ..
            } => {
                let mut args = vec![self.expr(expr)];
                args.extend(self.optional(trim_what));
                if let Some(chars) = trim_characters {
                    args.extend(self.exprs(chars));
                }
                Expr::Function {
                    name: "trim".to_string(),
                    args,
                }
            }
            SqlExpr::Ceil { expr, .. } => Expr::Function {
                name: "ceil".to_string(),
                args: vec![self.expr(expr)],
            },
            SqlExpr::Floor { expr, .. } => Expr::Function {
                name: "floor".to_string(),
                args: vec![self.expr(expr)],
            },
            SqlExpr::Convert { expr, styles, .. } => {
                let mut args = vec![self.expr(expr)];
                args.extend(self.exprs(styles));
                Expr::Function {
                    name: "convert".to_string(),
                    args,
                }
            }
            SqlExpr::Position { expr, r#in } => Expr::Function {
                name: "position".to_string(),
                args: vec![self.expr(expr), self.expr(r#in)],
            },
            SqlExpr::Overlay {
                expr,
                overlay_what,
                overlay_from,
                overlay_for,
            } => {
                let mut args = vec![
                    self.expr(expr),
                    self.expr(overlay_what),
                    self.expr(overlay_from),
                ];
                args.extend(self.optional(overlay_for));
                Expr::Function {
                    name: "overlay".to_string(),
                    args,
                }
            }
            SqlExpr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                let mut children: Vec<Expr> = self.optional(operand).into_iter().collect();
                for when in conditions {
                    children.push(self.expr(&when.condition));
                    children.push(self.expr(&when.result));
                }
                children.extend(self.optional(else_result));
                Expr::Other(children)
            }
            SqlExpr::Interval(interval) => Expr::Other(vec![self.expr(&interval.value)]),
            SqlExpr::Tuple(items) | SqlExpr::Array(Array { elem: items, .. }) => {
                Expr::Other(self.exprs(items))
            }
            SqlExpr::IsUnknown(inner)
            | SqlExpr::IsNotUnknown(inner)
            | SqlExpr::IsNormalized { expr: inner, .. }
            | SqlExpr::Collate { expr: inner, .. }
            | SqlExpr::Named { expr: inner, .. }
            | SqlExpr::Prefixed { value: inner, .. }
            | SqlExpr::OuterJoin(inner)
            | SqlExpr::Prior(inner)
            | SqlExpr::JsonAccess { value: inner, .. }
            | SqlExpr::CompoundFieldAccess { root: inner, .. } => {
                Expr::Other(vec![self.expr(inner)])
            }
            SqlExpr::SimilarTo { expr, pattern, .. } | SqlExpr::RLike { expr, pattern, .. } => {
                Expr::Other(vec![self.expr(expr), self.expr(pattern)])
            }
            SqlExpr::AnyOp { left, right, .. }
            | SqlExpr::AllOp { left, right, .. }
            | SqlExpr::InUnnest {
                expr: left,
                array_expr: right,
                ..
            } => Expr::Other(vec![self.expr(left), self.expr(right)]),
            SqlExpr::MemberOf(member) => {
                Expr::Other(vec![self.expr(&member.value), self.expr(&member.array)])
            }
            SqlExpr::GroupingSets(sets) | SqlExpr::Cube(sets) | SqlExpr::Rollup(sets) => {
                Expr::Other(sets.iter().flat_map(|set| self.exprs(set)).collect())
            }
            _ => Expr::Other(Vec::new()),
        }
    }

    fn optional(&mut self, expr: &Option<Box<SqlExpr>>) -> Option<Expr> {
        expr.as_deref().map(|inner| self.expr(inner))
    }
}

/// The parser's message without its own "sql parser error" prefix.
fn syntax_message(err: ParserError) -> String {
    match err {
        ParserError::TokenizerError(msg) | ParserError::ParserError(msg) => msg,
        other => other.to_string(),
    }
}

fn logical_op(op: &BinaryOperator) -> Option<LogicalOp> {
    match op {
        BinaryOperator::And => Some(LogicalOp::And),
        BinaryOperator::Or => Some(LogicalOp::Or),
        _ => None,
    }
}

fn compare_op(op: &BinaryOperator) -> Option<CompareOp> {
    match op {
        BinaryOperator::Eq => Some(CompareOp::Eq),
        BinaryOperator::NotEq => Some(CompareOp::NotEq),
        BinaryOperator::Lt => Some(CompareOp::Lt),
        BinaryOperator::LtEq => Some(CompareOp::LtEq),
        BinaryOperator::Gt => Some(CompareOp::Gt),
        BinaryOperator::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

fn literal_from_value(value: &Value) -> Literal {
    match value {
        Value::SingleQuotedString(s)
        | Value::DoubleQuotedString(s)
        | Value::EscapedStringLiteral(s)
        | Value::NationalStringLiteral(s) => Literal {
            text: s.clone(),
            kind: LiteralKind::String,
        },
        Value::Number(n, _) => Literal {
            text: n.clone(),
            kind: LiteralKind::Number,
        },
        Value::Null => Literal {
            text: "NULL".to_string(),
            kind: LiteralKind::Null,
        },
        other => Literal {
            text: other.to_string(),
            kind: LiteralKind::Other,
        },
    }
}

fn strip_single_quotes(text: &str) -> String {
    text.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(text)
        .to_string()
}

/// Extract the expression payload from a SQL function argument.
fn function_arg_expr(arg: &sqlparser::ast::FunctionArg) -> Option<&SqlExpr> {
    use sqlparser::ast::{FunctionArg, FunctionArgExpr};
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
        | FunctionArg::Named {
            arg: FunctionArgExpr::Expr(expr),
            ..
        }
        | FunctionArg::ExprNamed {
            arg: FunctionArgExpr::Expr(expr),
            ..
        } => Some(expr),
        _ => None,
    }
}

/// Extract the ON expression from a `JoinOperator`, if present.
fn join_on_expr(op: &JoinOperator) -> Option<&SqlExpr> {
    use sqlparser::ast::JoinOperator::{
        FullOuter, Inner, Join, Left, LeftOuter, Right, RightOuter,
    };
    let (Join(c) | Inner(c) | Left(c) | LeftOuter(c) | Right(c) | RightOuter(c) | FullOuter(c)) =
        op
    else {
        return None;
    };
    if let JoinConstraint::On(expr) = c {
        Some(expr)
    } else {
        None
    }
}
