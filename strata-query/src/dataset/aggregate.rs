//! Aggregate datasets and executor-backed terminals.

use tracing::debug;

use super::Dataset;
use crate::error::{QueryError, QueryResult};
use crate::executor::{BoundArguments, ExecuteResult, Executor, Row};
use crate::expr::{func, Expr, IntoColumn};
use crate::value::Value;

/// Aggregate functions with a dedicated helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    /// `count(..)`
    Count,
    /// `sum(..)`
    Sum,
    /// `min(..)`
    Min,
    /// `max(..)`
    Max,
    /// `avg(..)`
    Avg,
}

impl AggregateFunction {
    /// The SQL function name, also used as the result alias.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
        }
    }
}

impl Dataset {
    /// Check if aggregating this dataset requires wrapping it in a subselect.
    fn aggregate_needs_subselect(&self) -> bool {
        self.distinct.is_some()
            || self.limit.is_some()
            || self.offset.is_some()
            || self.raw_sql.is_some()
            || self.is_grouped()
            || !self.compounds.is_empty()
    }

    /// A dataset selecting a single aggregate over this dataset's rows.
    ///
    /// Ordering is dropped. Datasets whose row set an aggregate would change
    /// (distinct, limited, raw, grouped or compound) are wrapped first; a
    /// limited dataset keeps its ordering inside the subselect so the same
    /// rows are aggregated.
    pub fn aggregate_dataset(&self, function: AggregateFunction, argument: Expr) -> Dataset {
        let source = if !self.aggregate_needs_subselect() {
            self.unordered()
        } else if self.limit.is_some() || self.offset.is_some() {
            self.from_self()
        } else {
            self.unordered().from_self()
        };
        source
            .select([func(function.as_str(), [argument]).alias(function.as_str())])
            .unordered()
    }

    /// `SELECT count(*) AS count FROM ...`
    pub fn count_dataset(&self) -> Dataset {
        self.aggregate_dataset(AggregateFunction::Count, Expr::Wildcard(None))
    }

    /// `SELECT sum(column) AS sum FROM ...`
    pub fn sum_dataset(&self, column: impl IntoColumn) -> Dataset {
        self.aggregate_dataset(AggregateFunction::Sum, column.into_column())
    }

    /// `SELECT min(column) AS min FROM ...`
    pub fn min_dataset(&self, column: impl IntoColumn) -> Dataset {
        self.aggregate_dataset(AggregateFunction::Min, column.into_column())
    }

    /// `SELECT max(column) AS max FROM ...`
    pub fn max_dataset(&self, column: impl IntoColumn) -> Dataset {
        self.aggregate_dataset(AggregateFunction::Max, column.into_column())
    }

    /// `SELECT avg(column) AS avg FROM ...`
    pub fn avg_dataset(&self, column: impl IntoColumn) -> Dataset {
        self.aggregate_dataset(AggregateFunction::Avg, column.into_column())
    }

    // ============== Terminals ==============

    /// Fetch every row.
    pub async fn all<E: Executor + ?Sized>(&self, executor: &E) -> QueryResult<Vec<Row>> {
        let sql = self.select_sql()?;
        let rows = executor.query(&sql, BoundArguments::none()).await?;
        debug!(rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Fetch the first row. Applies `LIMIT 1` unless the dataset is raw SQL.
    pub async fn first<E: Executor + ?Sized>(&self, executor: &E) -> QueryResult<Option<Row>> {
        let dataset = if self.raw_sql.is_some() {
            self.clone()
        } else {
            self.limit(1)?
        };
        Ok(dataset.all(executor).await?.into_iter().next())
    }

    /// Fetch the first column of the first row.
    pub async fn single_value<E: Executor + ?Sized>(
        &self,
        executor: &E,
    ) -> QueryResult<Option<Value>> {
        Ok(self
            .first(executor)
            .await?
            .and_then(|row| row.into_iter().next().map(|(_, value)| value)))
    }

    /// Count the rows of this dataset.
    pub async fn count<E: Executor + ?Sized>(&self, executor: &E) -> QueryResult<u64> {
        match self.count_dataset().single_value(executor).await? {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| {
                    QueryError::database(format!(
                        "count returned a {} instead of a non-negative integer",
                        value.type_name()
                    ))
                }),
        }
    }

    /// Sum a column. `None` when there are no rows.
    pub async fn sum<E: Executor + ?Sized>(
        &self,
        executor: &E,
        column: impl IntoColumn,
    ) -> QueryResult<Option<Value>> {
        non_null(self.sum_dataset(column).single_value(executor).await?)
    }

    /// Smallest value of a column.
    pub async fn min<E: Executor + ?Sized>(
        &self,
        executor: &E,
        column: impl IntoColumn,
    ) -> QueryResult<Option<Value>> {
        non_null(self.min_dataset(column).single_value(executor).await?)
    }

    /// Largest value of a column.
    pub async fn max<E: Executor + ?Sized>(
        &self,
        executor: &E,
        column: impl IntoColumn,
    ) -> QueryResult<Option<Value>> {
        non_null(self.max_dataset(column).single_value(executor).await?)
    }

    /// Average of a column.
    pub async fn avg<E: Executor + ?Sized>(
        &self,
        executor: &E,
        column: impl IntoColumn,
    ) -> QueryResult<Option<Value>> {
        non_null(self.avg_dataset(column).single_value(executor).await?)
    }

    /// Insert one row.
    pub async fn insert<E, K, V>(
        &self,
        executor: &E,
        row: impl IntoIterator<Item = (K, V)>,
    ) -> QueryResult<ExecuteResult>
    where
        E: Executor + ?Sized,
        K: Into<String>,
        V: Into<Expr>,
    {
        let sql = self.insert_sql(row)?;
        executor.execute(&sql, BoundArguments::none()).await
    }

    /// Update matching rows, returning the number affected.
    pub async fn update<E, K, V>(
        &self,
        executor: &E,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> QueryResult<u64>
    where
        E: Executor + ?Sized,
        K: Into<String>,
        V: Into<Expr>,
    {
        let sql = self.update_sql(values)?;
        Ok(executor.execute(&sql, BoundArguments::none()).await?.rows_affected)
    }

    /// Delete matching rows, returning the number affected.
    pub async fn delete<E: Executor + ?Sized>(&self, executor: &E) -> QueryResult<u64> {
        let sql = self.delete_sql()?;
        Ok(executor.execute(&sql, BoundArguments::none()).await?.rows_affected)
    }
}

fn non_null(value: Option<Value>) -> QueryResult<Option<Value>> {
    Ok(value.filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::ErrorCode;
    use crate::executor::mock::{row, MockExecutor};
    use crate::expr::col;
    use pretty_assertions::assert_eq;

    fn items() -> Dataset {
        Dataset::table("items")
    }

    #[test]
    fn test_plain_aggregate_drops_order() {
        let ds = items().filter(col("active").eq(true)).order(["name"]);
        assert_eq!(
            ds.count_dataset().select_sql().unwrap(),
            "SELECT count(*) AS count FROM items WHERE (active = TRUE)"
        );
        assert_eq!(
            ds.max_dataset("price").select_sql().unwrap(),
            "SELECT max(price) AS max FROM items WHERE (active = TRUE)"
        );
    }

    #[test]
    fn test_aggregate_wraps_when_row_set_changes() {
        let distinct = items().distinct().select(["category"]).order(["category"]);
        assert_eq!(
            distinct.count_dataset().select_sql().unwrap(),
            "SELECT count(*) AS count FROM (SELECT DISTINCT category FROM items) AS t1"
        );

        let limited = items().order(["id"]).limit(5).unwrap();
        assert_eq!(
            limited.sum_dataset("price").select_sql().unwrap(),
            "SELECT sum(price) AS sum FROM (SELECT * FROM items ORDER BY id LIMIT 5) AS t1"
        );

        let grouped = items().group(["category"]).select(["category"]);
        assert_eq!(
            grouped.count_dataset().select_sql().unwrap(),
            "SELECT count(*) AS count FROM (SELECT category FROM items GROUP BY category) AS t1"
        );

        let raw = Dataset::raw("SELECT 1 AS x");
        assert_eq!(
            raw.avg_dataset("x").select_sql().unwrap(),
            "SELECT avg(x) AS avg FROM (SELECT 1 AS x) AS t1"
        );
    }

    #[test]
    fn test_oracle_subquery_alias_has_no_as() {
        let limited = items().limit(5).unwrap().with_dialect(Dialect::ORACLE);
        assert_eq!(
            limited.count_dataset().select_sql().unwrap(),
            "SELECT count(*) AS \"COUNT\" FROM \
             (SELECT * FROM \"ITEMS\" FETCH FIRST 5 ROWS ONLY) \"T1\""
        );
    }

    #[tokio::test]
    async fn test_count_runs_through_executor() {
        let exec = MockExecutor::with_rows(vec![row(&[("count", Value::Int(42))])]);
        let n = items().filter(col("a").gt(1)).count(&exec).await.unwrap();
        assert_eq!(n, 42);
        assert_eq!(
            exec.sql(),
            vec!["SELECT count(*) AS count FROM items WHERE (a > 1) LIMIT 1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_count_rejects_non_integer() {
        let exec = MockExecutor::with_rows(vec![row(&[("count", Value::from("many"))])]);
        let err = items().count(&exec).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn test_empty_aggregates() {
        let exec = MockExecutor::with_rows(vec![row(&[("sum", Value::Null)])]);
        assert_eq!(items().sum(&exec, "price").await.unwrap(), None);
        let exec = MockExecutor::default();
        assert_eq!(items().count(&exec).await.unwrap(), 0);
        assert_eq!(items().min(&exec, "price").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_first_and_single_value() {
        let exec = MockExecutor::with_rows(vec![row(&[
            ("name", Value::from("bolt")),
            ("price", Value::Int(3)),
        ])]);
        let first = items().order(["name"]).first(&exec).await.unwrap().unwrap();
        assert_eq!(first["price"], Value::Int(3));
        let name = items().select(["name"]).single_value(&exec).await.unwrap();
        assert_eq!(name, Some(Value::from("bolt")));
        assert_eq!(
            exec.sql(),
            vec![
                "SELECT * FROM items ORDER BY name LIMIT 1".to_string(),
                "SELECT name FROM items LIMIT 1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_modifying_terminals() {
        let exec = MockExecutor {
            affected: 3,
            ..Default::default()
        };
        let result = items().insert(&exec, [("name", "nut")]).await.unwrap();
        assert_eq!(result.last_insert_id, Some(1));
        let updated = items()
            .filter(col("id").gt(10))
            .update(&exec, [("active", false)])
            .await
            .unwrap();
        assert_eq!(updated, 3);
        assert_eq!(items().delete(&exec).await.unwrap(), 3);
        assert_eq!(
            exec.sql(),
            vec![
                "INSERT INTO items (name) VALUES ('nut')".to_string(),
                "UPDATE items SET active = FALSE WHERE (id > 10)".to_string(),
                "DELETE FROM items".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_validation_happens_before_execution() {
        let exec = MockExecutor::default();
        let err = items().group(["a"]).delete(&exec).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(exec.sql().is_empty());
    }
}
