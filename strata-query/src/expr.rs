//! Expression tree for predicates, projections, functions and orderings.
//!
//! [`Expr`] is a closed enum: every node a dataset can carry is one of its
//! variants, and [`crate::render`] turns any tree into SQL text for a given
//! [`crate::Dialect`]. Trees are built with the free helpers in this module
//! and the combinator methods on `Expr`:
//!
//! ```rust
//! use strata_query::{col, lit, render, Dialect};
//!
//! let expr = col("age").gt_eq(18) & col("status").eq("active");
//! let sql = render(&expr, &Dialect::GENERIC).unwrap();
//! assert_eq!(sql, "((age >= 18) AND (status = 'active'))");
//!
//! let negated = !col("deleted");
//! assert_eq!(render(&negated, &Dialect::GENERIC).unwrap(), "NOT deleted");
//! # let _ = lit(1);
//! ```
//!
//! String slices convert to *literals*; use [`col`] (or pass a `&str` to a
//! dataset method that expects a column) for identifiers.

use std::ops;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::dataset::Dataset;
use crate::value::Value;

/// SQL operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Comparison
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,

    // Pattern matching
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// Case-insensitive `ILIKE`
    ILike,
    /// `NOT ILIKE`
    NotILike,
    /// Regular expression match
    Regex,
    /// Negated regular expression match
    NotRegex,

    // Arithmetic
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// String concatenation
    Concat,

    // Bitwise
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,

    // Logical
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// How many operands an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly two operands.
    Binary,
    /// Two or more operands.
    Variadic,
}

impl Operator {
    /// The operator's SQL text, for operators whose text does not depend on
    /// the dialect.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::ILike => "ILIKE",
            Self::NotILike => "NOT ILIKE",
            Self::Regex => "~",
            Self::NotRegex => "!~",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Concat => "||",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// The operator-arity table.
    pub const fn arity(&self) -> Arity {
        match self {
            Self::Add
            | Self::Mul
            | Self::Concat
            | Self::BitAnd
            | Self::BitOr
            | Self::And
            | Self::Or => Arity::Variadic,
            _ => Arity::Binary,
        }
    }

    /// Check whether the operator accepts `count` operands.
    pub const fn accepts(&self, count: usize) -> bool {
        match self.arity() {
            Arity::Binary => count == 2,
            Arity::Variadic => count >= 2,
        }
    }

    /// The logical inverse of a comparison operator, if it has one.
    pub const fn inverse(&self) -> Option<Operator> {
        Some(match self {
            Self::Eq => Self::NotEq,
            Self::NotEq => Self::Eq,
            Self::Lt => Self::GtEq,
            Self::GtEq => Self::Lt,
            Self::Gt => Self::LtEq,
            Self::LtEq => Self::Gt,
            Self::Is => Self::IsNot,
            Self::IsNot => Self::Is,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
            Self::Like => Self::NotLike,
            Self::NotLike => Self::Like,
            Self::ILike => Self::NotILike,
            Self::NotILike => Self::ILike,
            Self::Regex => Self::NotRegex,
            Self::NotRegex => Self::Regex,
            _ => return None,
        })
    }
}

/// Placement of NULLs in an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    /// `NULLS FIRST`
    First,
    /// `NULLS LAST`
    Last,
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A column or table identifier, optionally qualified and aliased.
    Identifier {
        /// The identifier name.
        name: String,
        /// Optional table qualifier.
        table: Option<String>,
        /// Optional alias (`name AS alias`).
        alias: Option<String>,
    },
    /// A binary operation, rendered as `(left op right)`.
    BinaryOp {
        /// The operator.
        op: Operator,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// An n-ary operation, rendered as `(a op b op c)`.
    NaryOp {
        /// The operator.
        op: Operator,
        /// The operands.
        operands: Vec<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// A function call.
    FunctionCall {
        /// Function name, emitted as written.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
        /// Whether `DISTINCT` precedes the arguments.
        distinct: bool,
    },
    /// A `CASE WHEN ... THEN ... ELSE ... END` expression.
    Case {
        /// `(condition, result)` branches.
        branches: Vec<(Expr, Expr)>,
        /// The `ELSE` result.
        default: Option<Box<Expr>>,
    },
    /// Array subscript: `expr[i, j]`.
    Subscript {
        /// The subscripted expression.
        expr: Box<Expr>,
        /// The indexes.
        indexes: Vec<Expr>,
    },
    /// An ordering term.
    Ordered {
        /// The ordered expression.
        expr: Box<Expr>,
        /// Descending order.
        desc: bool,
        /// Placement of NULLs.
        nulls: Option<NullsOrder>,
    },
    /// An aliased expression: `expr AS alias`.
    Aliased {
        /// The expression.
        expr: Box<Expr>,
        /// The alias.
        alias: String,
    },
    /// A parenthesized subquery.
    Subquery(Box<Dataset>),
    /// A named placeholder, bound when a prepared statement is called.
    Placeholder(String),
    /// `*` or `table.*`.
    Wildcard(Option<String>),
    /// Trusted SQL text, emitted verbatim.
    Raw(String),
    /// Trusted SQL text whose `?` markers are replaced by rendered arguments.
    PlaceholderLiteral {
        /// The SQL text.
        sql: String,
        /// One argument per `?`.
        args: Vec<Expr>,
    },
}

// ============== Constructors ==============

/// Create a column reference. `"table.column"` is split into a qualified
/// identifier.
pub fn col(name: impl Into<String>) -> Expr {
    let name = name.into();
    match name.split_once('.') {
        Some((table, column)) if !table.is_empty() && !column.is_empty() => {
            if column == "*" {
                Expr::Wildcard(Some(table.to_string()))
            } else {
                qualified(table, column)
            }
        }
        _ => Expr::Identifier {
            name,
            table: None,
            alias: None,
        },
    }
}

/// Create a table-qualified column reference.
pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Expr {
    Expr::Identifier {
        name: name.into(),
        table: Some(table.into()),
        alias: None,
    }
}

/// Create a literal.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// `*`
pub fn star() -> Expr {
    Expr::Wildcard(None)
}

/// Create a function call.
pub fn func(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::FunctionCall {
        name: name.into(),
        args: args.into_iter().collect(),
        distinct: false,
    }
}

/// `COUNT(*)`
pub fn count_all() -> Expr {
    func("count", [star()])
}

/// Create a named placeholder for a prepared statement.
pub fn placeholder(name: impl Into<String>) -> Expr {
    Expr::Placeholder(name.into())
}

/// Trusted SQL emitted verbatim. Never pass user input.
pub fn raw(sql: impl Into<String>) -> Expr {
    Expr::Raw(sql.into())
}

/// Trusted SQL with `?` markers substituted by rendered literals.
///
/// Only the arguments are escaped; the SQL text itself is emitted verbatim.
pub fn raw_with(sql: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::PlaceholderLiteral {
        sql: sql.into(),
        args: args.into_iter().collect(),
    }
}

/// Start a `CASE` expression.
pub fn case() -> CaseBuilder {
    CaseBuilder::default()
}

/// Builder for `CASE` expressions.
#[derive(Debug, Clone, Default)]
pub struct CaseBuilder {
    branches: Vec<(Expr, Expr)>,
}

impl CaseBuilder {
    /// Add a `WHEN condition THEN result` branch.
    pub fn when(mut self, condition: impl Into<Expr>, result: impl Into<Expr>) -> Self {
        self.branches.push((condition.into(), result.into()));
        self
    }

    /// Finish with an `ELSE` result.
    pub fn otherwise(self, default: impl Into<Expr>) -> Expr {
        Expr::Case {
            branches: self.branches,
            default: Some(Box::new(default.into())),
        }
    }

    /// Finish without an `ELSE` result.
    pub fn end(self) -> Expr {
        Expr::Case {
            branches: self.branches,
            default: None,
        }
    }
}

// ============== Combinators ==============

impl Expr {
    /// Build a binary operation.
    pub fn binary(op: Operator, left: impl Into<Expr>, right: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left.into()),
            right: Box::new(right.into()),
        }
    }

    /// Build an n-ary operation.
    pub fn nary(op: Operator, operands: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::NaryOp {
            op,
            operands: operands.into_iter().collect(),
        }
    }

    fn flatten(op: Operator, left: Expr, right: Expr) -> Expr {
        let mut operands = Vec::new();
        for side in [left, right] {
            match side {
                Expr::NaryOp { op: inner, operands: nested } if inner == op => {
                    operands.extend(nested)
                }
                other => operands.push(other),
            }
        }
        Expr::NaryOp { op, operands }
    }

    /// Conjoin with another predicate, flattening nested `AND`s.
    pub fn and(self, other: impl Into<Expr>) -> Expr {
        Self::flatten(Operator::And, self, other.into())
    }

    /// Disjoin with another predicate, flattening nested `OR`s.
    pub fn or(self, other: impl Into<Expr>) -> Expr {
        Self::flatten(Operator::Or, self, other.into())
    }

    /// Conjoin every predicate. Returns `None` for an empty input.
    pub fn and_all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates.into_iter().reduce(Expr::and)
    }

    /// Logical negation. Comparisons are inverted and double negation is
    /// removed.
    pub fn negate(self) -> Expr {
        match self {
            Expr::Not(inner) => *inner,
            Expr::BinaryOp { op, left, right } => match op.inverse() {
                Some(inverse) => Expr::BinaryOp {
                    op: inverse,
                    left,
                    right,
                },
                None => Expr::Not(Box::new(Expr::BinaryOp { op, left, right })),
            },
            other => Expr::Not(Box::new(other)),
        }
    }

    /// `self = rhs`
    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::Eq, self, rhs)
    }

    /// `self != rhs`
    pub fn not_eq(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::NotEq, self, rhs)
    }

    /// `self < rhs`
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::Lt, self, rhs)
    }

    /// `self <= rhs`
    pub fn lt_eq(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::LtEq, self, rhs)
    }

    /// `self > rhs`
    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::Gt, self, rhs)
    }

    /// `self >= rhs`
    pub fn gt_eq(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::GtEq, self, rhs)
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Expr {
        Self::binary(Operator::Is, self, Expr::Literal(Value::Null))
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Expr {
        Self::binary(Operator::IsNot, self, Expr::Literal(Value::Null))
    }

    /// `self IN (...)`. Accepts a list literal or a subquery.
    pub fn in_list(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::In, self, rhs)
    }

    /// `self NOT IN (...)`
    pub fn not_in(self, rhs: impl Into<Expr>) -> Expr {
        Self::binary(Operator::NotIn, self, rhs)
    }

    /// `self >= low AND self <= high`
    pub fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        self.clone().gt_eq(low).and(self.lt_eq(high))
    }

    /// `self LIKE pattern`
    pub fn like(self, pattern: impl Into<Expr>) -> Expr {
        Self::binary(Operator::Like, self, pattern)
    }

    /// `self NOT LIKE pattern`
    pub fn not_like(self, pattern: impl Into<Expr>) -> Expr {
        Self::binary(Operator::NotLike, self, pattern)
    }

    /// `self ILIKE pattern`
    pub fn ilike(self, pattern: impl Into<Expr>) -> Expr {
        Self::binary(Operator::ILike, self, pattern)
    }

    /// Regular expression match.
    pub fn matches(self, pattern: impl Into<Expr>) -> Expr {
        Self::binary(Operator::Regex, self, pattern)
    }

    /// String concatenation.
    pub fn concat(self, rhs: impl Into<Expr>) -> Expr {
        Self::flatten(Operator::Concat, self, rhs.into())
    }

    /// Alias this expression.
    pub fn alias(self, alias: impl Into<String>) -> Expr {
        let alias = alias.into();
        match self {
            Expr::Identifier { name, table, .. } => Expr::Identifier {
                name,
                table,
                alias: Some(alias),
            },
            other => Expr::Aliased {
                expr: Box::new(other),
                alias,
            },
        }
    }

    /// Ascending ordering term.
    pub fn asc(self) -> Expr {
        self.ordered(false)
    }

    /// Descending ordering term.
    pub fn desc(self) -> Expr {
        self.ordered(true)
    }

    fn ordered(self, desc: bool) -> Expr {
        match self {
            Expr::Ordered { expr, nulls, .. } => Expr::Ordered { expr, desc, nulls },
            other => Expr::Ordered {
                expr: Box::new(other),
                desc,
                nulls: None,
            },
        }
    }

    /// Place NULLs first in this ordering term.
    pub fn nulls_first(self) -> Expr {
        self.with_nulls(NullsOrder::First)
    }

    /// Place NULLs last in this ordering term.
    pub fn nulls_last(self) -> Expr {
        self.with_nulls(NullsOrder::Last)
    }

    fn with_nulls(self, order: NullsOrder) -> Expr {
        match self {
            Expr::Ordered { expr, desc, .. } => Expr::Ordered {
                expr,
                desc,
                nulls: Some(order),
            },
            other => Expr::Ordered {
                expr: Box::new(other),
                desc: false,
                nulls: Some(order),
            },
        }
    }

    /// Reverse an ordering term. Plain expressions become descending.
    pub fn invert_order(self) -> Expr {
        match self {
            Expr::Ordered { expr, desc, nulls } => Expr::Ordered {
                expr,
                desc: !desc,
                nulls: nulls.map(|n| match n {
                    NullsOrder::First => NullsOrder::Last,
                    NullsOrder::Last => NullsOrder::First,
                }),
            },
            other => other.desc(),
        }
    }

    /// Array subscript.
    pub fn subscript(self, indexes: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Subscript {
            expr: Box::new(self),
            indexes: indexes.into_iter().collect(),
        }
    }

    /// Mark a function call as `DISTINCT`. Other expressions are unchanged.
    pub fn distinct(self) -> Expr {
        match self {
            Expr::FunctionCall { name, args, .. } => Expr::FunctionCall {
                name,
                args,
                distinct: true,
            },
            other => other,
        }
    }

    /// The alias this expression is selected under, if any.
    pub fn alias_name(&self) -> Option<&str> {
        match self {
            Expr::Identifier { alias: Some(a), .. } | Expr::Aliased { alias: a, .. } => Some(a),
            _ => None,
        }
    }
}

// ============== Column-position conversion ==============

/// Conversion used where a dataset expects a column: strings become
/// identifiers rather than literals.
pub trait IntoColumn {
    /// Convert into a column expression.
    fn into_column(self) -> Expr;
}

impl IntoColumn for Expr {
    fn into_column(self) -> Expr {
        self
    }
}

impl IntoColumn for &str {
    fn into_column(self) -> Expr {
        col(self)
    }
}

impl IntoColumn for String {
    fn into_column(self) -> Expr {
        col(self)
    }
}

impl IntoColumn for &String {
    fn into_column(self) -> Expr {
        col(self.as_str())
    }
}

// ============== Operator overloads ==============

impl ops::BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl ops::BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        self.negate()
    }
}

macro_rules! impl_arith {
    ($($trait:ident, $method:ident, $op:expr, $variadic:expr);*) => {
        $(
            impl<T: Into<Expr>> ops::$trait<T> for Expr {
                type Output = Expr;

                fn $method(self, rhs: T) -> Expr {
                    if $variadic {
                        Expr::flatten($op, self, rhs.into())
                    } else {
                        Expr::binary($op, self, rhs)
                    }
                }
            }
        )*
    };
}

impl_arith!(
    Add, add, Operator::Add, true;
    Sub, sub, Operator::Sub, false;
    Mul, mul, Operator::Mul, true;
    Div, div, Operator::Div, false;
    Rem, rem, Operator::Mod, false
);

// ============== Literal conversions ==============

macro_rules! impl_literal_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(v: $t) -> Self {
                    Expr::Literal(Value::from(v))
                }
            }
        )*
    };
}

impl_literal_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    &[u8],
    Decimal,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<FixedOffset>,
    serde_json::Value
);

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(v: Option<T>) -> Self {
        Expr::Literal(v.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Expr {
    fn from(v: Vec<T>) -> Self {
        Expr::Literal(v.into())
    }
}

impl From<Dataset> for Expr {
    fn from(ds: Dataset) -> Self {
        Expr::Subquery(Box::new(ds))
    }
}

impl From<&Dataset> for Expr {
    fn from(ds: &Dataset) -> Self {
        Expr::Subquery(Box::new(ds.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_splits_qualified_names() {
        assert_eq!(col("items.id"), qualified("items", "id"));
        assert_eq!(col("items.*"), Expr::Wildcard(Some("items".into())));
        assert!(matches!(col("id"), Expr::Identifier { table: None, .. }));
    }

    #[test]
    fn test_and_flattens() {
        let a = col("a").eq(1);
        let b = col("b").eq(2);
        let c = col("c").eq(3);
        let left = a.clone().and(b.clone()).and(c.clone());
        let right = a.clone().and(b.clone().and(c.clone()));
        assert_eq!(left, right);
        match left {
            Expr::NaryOp { op, operands } => {
                assert_eq!(op, Operator::And);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_and_does_not_merge_or() {
        let expr = (col("a").eq(1) | col("b").eq(2)) & col("c").eq(3);
        match expr {
            Expr::NaryOp { op, operands } => {
                assert_eq!(op, Operator::And);
                assert_eq!(operands.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negate_inverts_comparisons() {
        assert_eq!(!col("a").eq(1), col("a").not_eq(1));
        assert_eq!(!col("a").is_null(), col("a").is_not_null());
        assert_eq!(!!col("flag"), col("flag"));
        assert!(matches!(!(col("a") & col("b")), Expr::Not(_)));
    }

    #[test]
    fn test_arity_table() {
        assert!(Operator::And.accepts(3));
        assert!(Operator::Eq.accepts(2));
        assert!(!Operator::Eq.accepts(3));
        assert!(!Operator::Or.accepts(1));
    }

    #[test]
    fn test_invert_order() {
        assert_eq!(col("a").invert_order(), col("a").desc());
        assert_eq!(col("a").desc().invert_order(), col("a").asc());
        assert_eq!(
            col("a").asc().nulls_first().invert_order(),
            col("a").desc().nulls_last()
        );
    }

    #[test]
    fn test_alias_on_identifier() {
        let expr = col("name").alias("n");
        assert_eq!(expr.alias_name(), Some("n"));
        assert!(matches!(expr, Expr::Identifier { .. }));
        assert!(matches!(count_all().alias("c"), Expr::Aliased { .. }));
    }

    #[test]
    fn test_literal_conversions() {
        assert_eq!(Expr::from("x"), Expr::Literal(Value::String("x".into())));
        assert_eq!(Expr::from(None::<i64>), Expr::Literal(Value::Null));
        assert_eq!("id".into_column(), col("id"));
    }
}
