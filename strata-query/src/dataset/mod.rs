//! Immutable query descriptors.
//!
//! A [`Dataset`] describes a query without being tied to SQL text. Every
//! transformer borrows the receiver and returns a new dataset, so a base
//! dataset can be shared and refined freely:
//!
//! ```rust
//! use strata_query::{col, Dataset};
//!
//! let items = Dataset::table("items");
//! let active = items.filter([("status", "active")]).limit(10).unwrap();
//!
//! assert_eq!(items.select_sql().unwrap(), "SELECT * FROM items");
//! assert_eq!(
//!     active.select_sql().unwrap(),
//!     "SELECT * FROM items WHERE (status = 'active') LIMIT 10"
//! );
//!
//! let cheap = active.exclude(col("price").gt(100)).order(["name"]);
//! assert_eq!(
//!     cheap.select_sql().unwrap(),
//!     "SELECT * FROM items WHERE ((status = 'active') AND (price <= 100)) ORDER BY name LIMIT 10"
//! );
//! ```
//!
//! Transformers that can reject their input (`having` without `group`, `or`
//! without a filter, a zero limit) return a [`QueryResult`]. Compilers
//! validate the remaining combinations against the dataset's [`Dialect`]
//! before producing any SQL.

mod aggregate;
mod compile;

use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::expr::{Expr, IntoColumn};

pub use aggregate::AggregateFunction;

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL JOIN`
    Full,
    /// `CROSS JOIN`
    Cross,
}

impl JoinKind {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// How a joined table is matched.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinCondition {
    /// No condition (cross joins).
    None,
    /// `ON expr`
    On(Expr),
    /// `USING (a, b)`
    Using(Vec<String>),
}

/// A joined table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// The join type.
    pub kind: JoinKind,
    /// The joined table (an identifier, aliased identifier or subquery).
    pub table: Expr,
    /// The join condition.
    pub condition: JoinCondition,
}

/// `DISTINCT` variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Distinct {
    /// `SELECT DISTINCT`
    All,
    /// `SELECT DISTINCT ON (exprs)`
    On(Vec<Expr>),
}

/// Row lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockStrength {
    /// `FOR UPDATE`
    Update,
    /// `FOR SHARE`
    Share,
}

/// Behaviour when a row is already locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LockWait {
    /// Block until the lock is available.
    #[default]
    Wait,
    /// `NOWAIT`
    NoWait,
    /// `SKIP LOCKED`
    SkipLocked,
}

/// A row locking clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockMode {
    /// Lock strength.
    pub strength: LockStrength,
    /// Wait behaviour.
    pub wait: LockWait,
}

impl LockMode {
    /// `FOR UPDATE`
    pub fn update() -> Self {
        Self {
            strength: LockStrength::Update,
            wait: LockWait::Wait,
        }
    }

    /// `FOR SHARE`
    pub fn share() -> Self {
        Self {
            strength: LockStrength::Share,
            wait: LockWait::Wait,
        }
    }

    /// Add `NOWAIT`.
    pub fn nowait(mut self) -> Self {
        self.wait = LockWait::NoWait;
        self
    }

    /// Add `SKIP LOCKED`.
    pub fn skip_locked(mut self) -> Self {
        self.wait = LockWait::SkipLocked;
        self
    }
}

/// Set operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOperation {
    /// `UNION`
    Union,
    /// `INTERSECT`
    Intersect,
    /// `EXCEPT`
    Except,
}

/// A set operation appended to a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    /// The operation.
    pub op: SetOperation,
    /// `ALL` (keep duplicates).
    pub all: bool,
    /// The right-hand dataset.
    pub dataset: Box<Dataset>,
}

/// Alias given to a dataset wrapped by [`Dataset::from_self`].
pub const FROM_SELF_ALIAS: &str = "t1";

/// An immutable query descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dialect: Dialect,
    source: Vec<Expr>,
    selection: Option<Vec<Expr>>,
    predicate: Option<Expr>,
    having: Option<Expr>,
    grouping: Vec<Expr>,
    ordering: Vec<Expr>,
    joins: Vec<JoinClause>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: Option<Distinct>,
    raw_sql: Option<String>,
    lock_mode: Option<LockMode>,
    compounds: Vec<Compound>,
    returning: Vec<Expr>,
    force_having: bool,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(Dialect::GENERIC)
    }
}

impl From<&str> for Dataset {
    fn from(table: &str) -> Self {
        Self::table(table)
    }
}

impl Dataset {
    /// An empty dataset (no source table) for a dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            source: Vec::new(),
            selection: None,
            predicate: None,
            having: None,
            grouping: Vec::new(),
            ordering: Vec::new(),
            joins: Vec::new(),
            limit: None,
            offset: None,
            distinct: None,
            raw_sql: None,
            lock_mode: None,
            compounds: Vec::new(),
            returning: Vec::new(),
            force_having: false,
        }
    }

    /// A dataset selecting from one table, using the generic dialect.
    pub fn table(table: impl IntoColumn) -> Self {
        Self::new(Dialect::GENERIC).from_tables([table])
    }

    /// A dataset wrapping hand-written SQL. Every compiler returns it verbatim.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(Dialect::GENERIC).with_sql(sql)
    }

    // ============== Accessors ==============

    /// The dialect this dataset renders with.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Source tables.
    pub fn source(&self) -> &[Expr] {
        &self.source
    }

    /// Explicit selection, or `None` for `*`.
    pub fn selection(&self) -> Option<&[Expr]> {
        self.selection.as_deref()
    }

    /// The WHERE predicate.
    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }

    /// The HAVING predicate.
    pub fn having_predicate(&self) -> Option<&Expr> {
        self.having.as_ref()
    }

    /// GROUP BY expressions.
    pub fn grouping(&self) -> &[Expr] {
        &self.grouping
    }

    /// ORDER BY terms.
    pub fn ordering(&self) -> &[Expr] {
        &self.ordering
    }

    /// Joined tables.
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Row limit.
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Row offset.
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// DISTINCT setting.
    pub fn distinct_value(&self) -> Option<&Distinct> {
        self.distinct.as_ref()
    }

    /// Raw SQL override.
    pub fn raw_sql(&self) -> Option<&str> {
        self.raw_sql.as_deref()
    }

    /// Row lock.
    pub fn lock_mode(&self) -> Option<LockMode> {
        self.lock_mode
    }

    /// Appended set operations.
    pub fn compounds(&self) -> &[Compound] {
        &self.compounds
    }

    /// RETURNING columns.
    pub fn returning_columns(&self) -> &[Expr] {
        &self.returning
    }

    /// Check if the dataset is grouped.
    pub fn is_grouped(&self) -> bool {
        !self.grouping.is_empty()
    }

    // ============== Transformers ==============

    /// Render with another dialect.
    pub fn with_dialect(&self, dialect: Dialect) -> Dataset {
        Dataset {
            dialect,
            ..self.clone()
        }
    }

    /// Replace the source tables.
    pub fn from_tables<I>(&self, tables: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        Dataset {
            source: tables.into_iter().map(IntoColumn::into_column).collect(),
            ..self.clone()
        }
    }

    /// Replace the selection. An empty list selects `*`.
    pub fn select<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        let columns: Vec<Expr> = columns.into_iter().map(IntoColumn::into_column).collect();
        Dataset {
            selection: (!columns.is_empty()).then_some(columns),
            ..self.clone()
        }
    }

    /// Append to the selection. Appending to `*` keeps the `*`.
    pub fn select_append<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        let mut selection = self
            .selection
            .clone()
            .unwrap_or_else(|| vec![Expr::Wildcard(None)]);
        selection.extend(columns.into_iter().map(IntoColumn::into_column));
        Dataset {
            selection: Some(selection),
            ..self.clone()
        }
    }

    /// Select `*`.
    pub fn select_all(&self) -> Dataset {
        Dataset {
            selection: None,
            ..self.clone()
        }
    }

    /// Conjoin a predicate with the existing WHERE clause.
    ///
    /// Filtering twice is the same as filtering once with both predicates
    /// joined by `AND`.
    pub fn filter(&self, condition: impl Into<Condition>) -> Dataset {
        let expr = condition.into().into_expr();
        Dataset {
            predicate: Some(match self.predicate.clone() {
                Some(existing) => existing.and(expr),
                None => expr,
            }),
            ..self.clone()
        }
    }

    /// Conjoin the negation of a predicate.
    pub fn exclude(&self, condition: impl Into<Condition>) -> Dataset {
        let negated = condition.into().into_expr().negate();
        self.filter(negated)
    }

    /// Disjoin a predicate with the existing WHERE clause.
    pub fn or(&self, condition: impl Into<Condition>) -> QueryResult<Dataset> {
        let existing = self
            .predicate
            .clone()
            .ok_or_else(|| QueryError::no_existing_filter("or"))?;
        Ok(Dataset {
            predicate: Some(existing.or(condition.into().into_expr())),
            ..self.clone()
        })
    }

    /// Remove the WHERE clause.
    pub fn unfiltered(&self) -> Dataset {
        Dataset {
            predicate: None,
            ..self.clone()
        }
    }

    /// Add a join.
    pub fn join_with(
        &self,
        kind: JoinKind,
        table: impl IntoColumn,
        condition: JoinCondition,
    ) -> Dataset {
        let mut joins = self.joins.clone();
        joins.push(JoinClause {
            kind,
            table: table.into_column(),
            condition,
        });
        Dataset {
            joins,
            ..self.clone()
        }
    }

    /// `INNER JOIN table ON condition`
    pub fn join(&self, table: impl IntoColumn, on: impl Into<Condition>) -> Dataset {
        self.join_with(
            JoinKind::Inner,
            table,
            JoinCondition::On(on.into().into_expr()),
        )
    }

    /// `LEFT JOIN table ON condition`
    pub fn left_join(&self, table: impl IntoColumn, on: impl Into<Condition>) -> Dataset {
        self.join_with(
            JoinKind::Left,
            table,
            JoinCondition::On(on.into().into_expr()),
        )
    }

    /// `RIGHT JOIN table ON condition`
    pub fn right_join(&self, table: impl IntoColumn, on: impl Into<Condition>) -> Dataset {
        self.join_with(
            JoinKind::Right,
            table,
            JoinCondition::On(on.into().into_expr()),
        )
    }

    /// `FULL JOIN table ON condition`
    pub fn full_join(&self, table: impl IntoColumn, on: impl Into<Condition>) -> Dataset {
        self.join_with(
            JoinKind::Full,
            table,
            JoinCondition::On(on.into().into_expr()),
        )
    }

    /// `CROSS JOIN table`
    pub fn cross_join(&self, table: impl IntoColumn) -> Dataset {
        self.join_with(JoinKind::Cross, table, JoinCondition::None)
    }

    /// `INNER JOIN table USING (columns)`
    pub fn join_using<I>(&self, table: impl IntoColumn, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.join_with(
            JoinKind::Inner,
            table,
            JoinCondition::Using(columns.into_iter().map(Into::into).collect()),
        )
    }

    /// Replace the GROUP BY clause.
    pub fn group<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        Dataset {
            grouping: columns.into_iter().map(IntoColumn::into_column).collect(),
            ..self.clone()
        }
    }

    /// Remove GROUP BY and HAVING.
    pub fn ungrouped(&self) -> Dataset {
        Dataset {
            grouping: Vec::new(),
            having: None,
            force_having: false,
            ..self.clone()
        }
    }

    /// Conjoin a HAVING predicate. Fails unless the dataset is grouped or
    /// HAVING was forced.
    pub fn having(&self, condition: impl Into<Condition>) -> QueryResult<Dataset> {
        if self.grouping.is_empty() && !self.force_having {
            return Err(QueryError::invalid_operation(
                "HAVING",
                "HAVING requires a GROUP BY clause",
            )
            .with_suggestion("Call group() before having(), or use force_having()"));
        }
        Ok(self.conjoin_having(condition.into().into_expr()))
    }

    /// Conjoin a HAVING predicate even without GROUP BY (the whole result is
    /// one group).
    pub fn force_having(&self, condition: impl Into<Condition>) -> Dataset {
        Dataset {
            force_having: true,
            ..self.conjoin_having(condition.into().into_expr())
        }
    }

    fn conjoin_having(&self, expr: Expr) -> Dataset {
        Dataset {
            having: Some(match self.having.clone() {
                Some(existing) => existing.and(expr),
                None => expr,
            }),
            ..self.clone()
        }
    }

    /// Replace the ORDER BY clause.
    pub fn order<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        Dataset {
            ordering: columns.into_iter().map(IntoColumn::into_column).collect(),
            ..self.clone()
        }
    }

    /// Append to the ORDER BY clause.
    pub fn order_append<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        let mut ordering = self.ordering.clone();
        ordering.extend(columns.into_iter().map(IntoColumn::into_column));
        Dataset {
            ordering,
            ..self.clone()
        }
    }

    /// Reverse every ordering term.
    pub fn reverse(&self) -> Dataset {
        Dataset {
            ordering: self
                .ordering
                .iter()
                .cloned()
                .map(Expr::invert_order)
                .collect(),
            ..self.clone()
        }
    }

    /// Remove the ORDER BY clause.
    pub fn unordered(&self) -> Dataset {
        Dataset {
            ordering: Vec::new(),
            ..self.clone()
        }
    }

    /// Limit the number of rows. The limit must be at least 1.
    pub fn limit(&self, limit: u64) -> QueryResult<Dataset> {
        if limit == 0 {
            return Err(QueryError::invalid_limit("Limit must be at least 1"));
        }
        Ok(Dataset {
            limit: Some(limit),
            ..self.clone()
        })
    }

    /// Limit and offset in one call.
    pub fn limit_offset(&self, limit: u64, offset: u64) -> QueryResult<Dataset> {
        Ok(self.limit(limit)?.offset(offset))
    }

    /// Skip rows. An offset of 0 removes the offset.
    pub fn offset(&self, offset: u64) -> Dataset {
        Dataset {
            offset: (offset > 0).then_some(offset),
            ..self.clone()
        }
    }

    /// Remove limit and offset.
    pub fn unlimited(&self) -> Dataset {
        Dataset {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// `SELECT DISTINCT`
    pub fn distinct(&self) -> Dataset {
        Dataset {
            distinct: Some(Distinct::All),
            ..self.clone()
        }
    }

    /// `SELECT DISTINCT ON (columns)`
    pub fn distinct_on<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        Dataset {
            distinct: Some(Distinct::On(
                columns.into_iter().map(IntoColumn::into_column).collect(),
            )),
            ..self.clone()
        }
    }

    /// Use hand-written SQL. Every compiler returns it verbatim.
    pub fn with_sql(&self, sql: impl Into<String>) -> Dataset {
        Dataset {
            raw_sql: Some(sql.into()),
            ..self.clone()
        }
    }

    /// Set a row lock.
    pub fn lock(&self, mode: LockMode) -> Dataset {
        Dataset {
            lock_mode: Some(mode),
            ..self.clone()
        }
    }

    /// `FOR UPDATE`
    pub fn for_update(&self) -> Dataset {
        self.lock(LockMode::update())
    }

    /// `FOR SHARE`
    pub fn for_share(&self) -> Dataset {
        self.lock(LockMode::share())
    }

    /// Set RETURNING columns for INSERT, UPDATE and DELETE.
    pub fn returning<I>(&self, columns: I) -> Dataset
    where
        I: IntoIterator,
        I::Item: IntoColumn,
    {
        Dataset {
            returning: columns.into_iter().map(IntoColumn::into_column).collect(),
            ..self.clone()
        }
    }

    /// Wrap this dataset as a subquery: `SELECT * FROM (...) AS t1`.
    pub fn from_self(&self) -> Dataset {
        Dataset::new(self.dialect).from_tables([Expr::Aliased {
            expr: Box::new(Expr::Subquery(Box::new(self.clone()))),
            alias: FROM_SELF_ALIAS.to_string(),
        }])
    }

    /// Append a set operation.
    ///
    /// Either side carrying an ORDER BY or LIMIT is wrapped first so the
    /// operation applies to its rows, and the result is wrapped so later
    /// filters apply to the combined rows.
    pub fn compound(&self, op: SetOperation, other: &Dataset, all: bool) -> Dataset {
        let mut left = self.compound_operand();
        left.compounds.push(Compound {
            op,
            all,
            dataset: Box::new(other.compound_operand()),
        });
        left.from_self()
    }

    fn compound_operand(&self) -> Dataset {
        if !self.ordering.is_empty() || self.limit.is_some() || self.offset.is_some() {
            self.from_self()
        } else {
            self.clone()
        }
    }

    /// `UNION`
    pub fn union(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Union, other, false)
    }

    /// `UNION ALL`
    pub fn union_all(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Union, other, true)
    }

    /// `INTERSECT`
    pub fn intersect(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Intersect, other, false)
    }

    /// `INTERSECT ALL`
    pub fn intersect_all(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Intersect, other, true)
    }

    /// `EXCEPT`
    pub fn except(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Except, other, false)
    }

    /// `EXCEPT ALL`
    pub fn except_all(&self, other: &Dataset) -> Dataset {
        self.compound(SetOperation::Except, other, true)
    }

    /// Column-scoped helpers: `ds.by("name").order()` instead of a
    /// generated `order_by_name`.
    pub fn by(&self, column: impl IntoColumn) -> By<'_> {
        By {
            dataset: self,
            column: column.into_column(),
        }
    }
}

/// Transformers scoped to one column. Created by [`Dataset::by`].
#[derive(Debug, Clone)]
pub struct By<'a> {
    dataset: &'a Dataset,
    column: Expr,
}

impl By<'_> {
    /// Filter on equality with a value (`IS NULL` for null, `IN` for lists).
    pub fn eq(self, value: impl Into<Expr>) -> Dataset {
        self.dataset
            .filter(crate::condition::equality(self.column, value.into()))
    }

    /// Order ascending by the column.
    pub fn order(self) -> Dataset {
        self.dataset.order([self.column])
    }

    /// Order descending by the column.
    pub fn order_desc(self) -> Dataset {
        self.dataset.order([self.column.desc()])
    }

    /// Group by the column.
    pub fn group(self) -> Dataset {
        self.dataset.group([self.column])
    }

    /// Select only the column.
    pub fn select(self) -> Dataset {
        self.dataset.select([self.column])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::expr::col;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transformers_do_not_mutate() {
        let base = Dataset::table("items");
        let filtered = base.filter(col("a").eq(1));
        assert!(base.predicate().is_none());
        assert!(filtered.predicate().is_some());
    }

    #[test]
    fn test_filter_twice_equals_conjunction() {
        let base = Dataset::table("items");
        let a = col("a").eq(1);
        let b = col("b").lt(col("c"));
        let twice = base.filter(a.clone()).filter(b.clone());
        let once = base.filter(a & b);
        assert_eq!(twice, once);
        assert_eq!(twice.select_sql().unwrap(), once.select_sql().unwrap());
    }

    #[test]
    fn test_or_requires_filter() {
        let err = Dataset::table("items").or(col("a").eq(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoExistingFilter);

        let ds = Dataset::table("items")
            .filter(col("a").eq(1))
            .or(col("b").eq(2))
            .unwrap();
        assert_eq!(
            ds.select_sql().unwrap(),
            "SELECT * FROM items WHERE ((a = 1) OR (b = 2))"
        );
    }

    #[test]
    fn test_having_requires_group() {
        let err = Dataset::table("items")
            .having(col("total").gt(10))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert_eq!(err.context.clause.as_deref(), Some("HAVING"));

        let ds = Dataset::table("items")
            .group(["category"])
            .having(col("total").gt(10))
            .unwrap();
        assert!(ds.having_predicate().is_some());

        let forced = Dataset::table("items").force_having(col("total").gt(10));
        assert_eq!(
            forced.select_sql().unwrap(),
            "SELECT * FROM items HAVING (total > 10)"
        );
    }

    #[test]
    fn test_ungrouped_clears_having() {
        let ds = Dataset::table("items")
            .group(["category"])
            .having(col("n").gt(1))
            .unwrap()
            .ungrouped();
        assert!(!ds.is_grouped());
        assert!(ds.having_predicate().is_none());
    }

    #[test]
    fn test_limit_validation() {
        let err = Dataset::table("items").limit(0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidLimit);
        let ds = Dataset::table("items").limit_offset(5, 0).unwrap();
        assert_eq!(ds.offset_value(), None);
        assert_eq!(ds.unlimited().limit_value(), None);
    }

    #[test]
    fn test_select_append_keeps_star() {
        let ds = Dataset::table("items").select_append([col("price") * 2]);
        assert_eq!(
            ds.select_sql().unwrap(),
            "SELECT *, (price * 2) FROM items"
        );
        let ds = Dataset::table("items").select(["id"]).select_append(["name"]);
        assert_eq!(ds.select_sql().unwrap(), "SELECT id, name FROM items");
        assert_eq!(ds.select_all().select_sql().unwrap(), "SELECT * FROM items");
    }

    #[test]
    fn test_reverse_and_unordered() {
        let ds = Dataset::table("items").order([col("a"), col("b").desc()]);
        assert_eq!(
            ds.reverse().select_sql().unwrap(),
            "SELECT * FROM items ORDER BY a DESC, b ASC"
        );
        assert_eq!(ds.unordered().select_sql().unwrap(), "SELECT * FROM items");
        let appended = ds.order_append(["c"]);
        assert_eq!(appended.ordering().len(), 3);
    }

    #[test]
    fn test_by_combinator() {
        let ds = Dataset::table("items");
        assert_eq!(
            ds.by("name").order_desc().select_sql().unwrap(),
            "SELECT * FROM items ORDER BY name DESC"
        );
        assert_eq!(
            ds.by("sku").eq("A-1").select_sql().unwrap(),
            "SELECT * FROM items WHERE (sku = 'A-1')"
        );
        assert_eq!(
            ds.by("parent_id").eq(None::<i64>).select_sql().unwrap(),
            "SELECT * FROM items WHERE (parent_id IS NULL)"
        );
        assert_eq!(
            ds.by("category").group().select_sql().unwrap(),
            "SELECT * FROM items GROUP BY category"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Dataset::from("items"), Dataset::table("items"));
    }
}
