//! Normalization of predicate inputs into expressions.
//!
//! Dataset filters accept anything that converts into a [`Condition`]:
//!
//! - an [`Expr`] passes through unchanged;
//! - a column → value mapping becomes a conjunction of equalities;
//! - an ordered list of pairs does the same but keeps duplicate columns,
//!   which is how a range on one column is written;
//! - [`Condition::raw`] is trusted SQL with `?` markers replaced by rendered
//!   literals.
//!
//! ```rust
//! use indexmap::IndexMap;
//! use strata_query::{render, Condition, Dialect, Value};
//!
//! let mut map = IndexMap::new();
//! map.insert("status", Value::from("active"));
//! map.insert("deleted_at", Value::Null);
//! let expr = Condition::from(map).into_expr();
//! assert_eq!(
//!     render(&expr, &Dialect::GENERIC).unwrap(),
//!     "((status = 'active') AND (deleted_at IS NULL))"
//! );
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::expr::{col, Expr};
use crate::value::Value;

/// A predicate in one of the accepted input shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A pre-built expression.
    Expr(Expr),
    /// Column/value pairs, conjoined in order. Duplicate columns are kept.
    Pairs(Vec<(String, Expr)>),
    /// Trusted SQL with `?` markers.
    Raw {
        /// The SQL text.
        sql: String,
        /// One value per `?`.
        args: Vec<Expr>,
    },
}

impl Condition {
    /// Trusted SQL with positional `?` markers.
    ///
    /// The SQL text is emitted verbatim: never build it from user input. Only
    /// `args` are escaped. A marker/argument count mismatch fails at render
    /// time.
    pub fn raw<V: Into<Expr>>(sql: impl Into<String>, args: impl IntoIterator<Item = V>) -> Self {
        Self::Raw {
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a condition from column/value pairs, keeping duplicates.
    pub fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Expr>,
    {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Normalize into an expression.
    ///
    /// An empty mapping is an always-true predicate.
    pub fn into_expr(self) -> Expr {
        match self {
            Condition::Expr(expr) => expr,
            Condition::Pairs(pairs) => Expr::and_all(
                pairs
                    .into_iter()
                    .map(|(column, rhs)| equality(col(column), rhs)),
            )
            .unwrap_or_else(|| Expr::Raw("(1 = 1)".to_string())),
            Condition::Raw { sql, args } => Expr::PlaceholderLiteral { sql, args },
        }
    }
}

/// The comparison a mapping entry stands for.
pub fn equality(column: Expr, rhs: Expr) -> Expr {
    match rhs {
        Expr::Literal(Value::Null) => column.is_null(),
        rhs @ (Expr::Literal(Value::List(_)) | Expr::Subquery(_)) => column.in_list(rhs),
        rhs => column.eq(rhs),
    }
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Condition::Expr(expr)
    }
}

impl<K: Into<String>, V: Into<Expr>> From<IndexMap<K, V>> for Condition {
    fn from(map: IndexMap<K, V>) -> Self {
        Condition::pairs(map)
    }
}

impl<K: Into<String>, V: Into<Expr>> From<BTreeMap<K, V>> for Condition {
    fn from(map: BTreeMap<K, V>) -> Self {
        Condition::pairs(map)
    }
}

impl<K: Into<String>, V: Into<Expr>> From<Vec<(K, V)>> for Condition {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Condition::pairs(pairs)
    }
}

impl<K: Into<String>, V: Into<Expr>, const N: usize> From<[(K, V); N]> for Condition {
    fn from(pairs: [(K, V); N]) -> Self {
        Condition::pairs(pairs)
    }
}
