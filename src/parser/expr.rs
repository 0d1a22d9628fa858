//! Parser-independent expression tree.
//!
//! The analysis engine never looks at `sqlparser` nodes directly: filter
//! expressions are lowered into this small tagged tree first (see
//! [`crate::parser::sql_parser`]), so only the node categories that matter for
//! partition analysis are distinguished and everything else collapses into
//! [`Expr::Other`].

use std::fmt;

/// Kind of a literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// Quoted string literal (`'2021-09-13'`).
    String,
    /// Numeric literal (`20210913`).
    Number,
    /// Typed literal such as `DATE '2021-09-13'`.
    Typed,
    /// `NULL`.
    Null,
    /// Booleans, placeholders and anything else.
    Other,
}

/// A literal value with its raw text (quotes removed for strings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// Raw text of the literal.
    pub text: String,
    /// Literal category.
    pub kind: LiteralKind,
}

/// A column reference, optionally qualified by a table alias or name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Dotted qualifier as written (`a`, `fact.sales_history`), if any.
    pub qualifier: Option<String>,
    /// Column name as written.
    pub name: String,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>` / `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    /// The operator obtained by swapping the operands (`a < b` ⇔ `b > a`).
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::NotEq => write!(f, "<>"),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::LtEq => write!(f, "<="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::GtEq => write!(f, ">="),
        }
    }
}

/// Boolean combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
}

/// Lowered SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Literal),
    /// Column reference.
    Column(ColumnRef),
    /// Function call, including `CAST`, `EXTRACT` and `AT TIME ZONE`.
    Function {
        /// Lowercased function name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// Binary comparison.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// Tested expression.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// `NOT BETWEEN`.
        negated: bool,
    },
    /// `expr [NOT] IN (list)`.
    InList {
        /// Tested expression.
        expr: Box<Expr>,
        /// Candidate values.
        list: Vec<Expr>,
        /// `NOT IN`.
        negated: bool,
    },
    /// `AND` / `OR`.
    Logical {
        /// Combinator.
        op: LogicalOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
    /// Parenthesized expression.
    Nested(Box<Expr>),
    /// Subquery; its body is lowered as a separate scope.
    Subquery,
    /// Any other node; known children are kept so walks still reach them.
    Other(Vec<Expr>),
}

impl Expr {
    /// Build an unqualified column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef {
            qualifier: None,
            name: name.into(),
        })
    }

    /// Build a string literal.
    pub fn string(text: impl Into<String>) -> Self {
        Expr::Literal(Literal {
            text: text.into(),
            kind: LiteralKind::String,
        })
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Column(_) | Expr::Subquery => Vec::new(),
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::Compare { left, right, .. } | Expr::Logical { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Between {
                expr, low, high, ..
            } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
            Expr::InList { expr, list, .. } => {
                let mut out = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            Expr::Not(inner) | Expr::Nested(inner) => vec![inner.as_ref()],
            Expr::Other(children) => children.iter().collect(),
        }
    }

    /// Pre-order walk over this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Every column reference in this subtree, in walk order.
    pub fn column_refs(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Expr::Column(column) = node {
                out.push(column);
            }
        });
        out
    }

    /// True when the subtree references no column.
    pub fn is_constant(&self) -> bool {
        self.column_refs().is_empty()
    }

    /// Strip any number of enclosing parentheses.
    pub fn unnested(&self) -> &Expr {
        match self {
            Expr::Nested(inner) => inner.unnested(),
            other => other,
        }
    }

    /// The column this expression is, when it is a bare (possibly parenthesized) column.
    pub fn as_bare_column(&self) -> Option<&ColumnRef> {
        match self.unnested() {
            Expr::Column(column) => Some(column),
            _ => None,
        }
    }
}
