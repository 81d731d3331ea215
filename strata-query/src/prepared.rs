//! Prepared statements and the per-session statement registry.
//!
//! A [`PreparedStatement`] renders a dataset once with [`placeholder`]
//! expressions left as markers, then binds a fresh set of values for every
//! call. The marker syntax follows the dataset's dialect:
//!
//! | Style | Marker | Repeated name |
//! |-------|--------|---------------|
//! | `Question` | `?` | repeats the value |
//! | `Numbered` | `$n` | reuses the number |
//! | `Colon` | `:name` | reuses the name |
//! | `At` | `@name` | reuses the name |
//!
//! ```rust
//! use strata_query::{col, placeholder, BoundArguments, Dataset, Dialect, StatementKind, Value};
//!
//! let by_owner = Dataset::table("items")
//!     .with_dialect(Dialect::POSTGRES)
//!     .filter(col("owner").eq(placeholder("owner")))
//!     .prepare(StatementKind::Select)
//!     .unwrap();
//!
//! assert_eq!(by_owner.sql(), "SELECT * FROM \"items\" WHERE (\"owner\" = $1)");
//! assert_eq!(
//!     by_owner.bind([("owner", 7)]).unwrap(),
//!     BoundArguments::Positional(vec![Value::Int(7)])
//! );
//! assert!(by_owner.bind(Vec::<(String, Value)>::new()).is_err());
//! ```
//!
//! [`placeholder`]: crate::expr::placeholder

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use crate::dataset::Dataset;
use crate::dialect::{Dialect, PlaceholderStyle};
use crate::error::{QueryError, QueryResult};
use crate::executor::{BoundArguments, ExecuteResult, Executor, Row};
use crate::expr::Expr;
use crate::render::Renderer;
use crate::value::Value;

/// The statement a dataset is prepared as.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `SELECT`
    Select,
    /// `INSERT` of one row of column/value pairs.
    Insert(Vec<(String, Expr)>),
    /// `UPDATE` setting column/value pairs.
    Update(Vec<(String, Expr)>),
    /// `DELETE`
    Delete,
}

impl StatementKind {
    /// An INSERT of column/value pairs.
    pub fn insert<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Expr>,
    {
        Self::Insert(collect_pairs(pairs))
    }

    /// An UPDATE of column/value pairs.
    pub fn update<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Expr>,
    {
        Self::Update(collect_pairs(pairs))
    }

    /// The statement keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Check if the statement returns rows.
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Select)
    }
}

fn collect_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(String, Expr)>
where
    K: Into<String>,
    V: Into<Expr>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Placeholder names of one statement. Most statements have only a few.
type Names = SmallVec<[String; 8]>;

/// A dataset rendered once into templated SQL.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    dataset: Dataset,
    kind: StatementKind,
    sql: Arc<str>,
    occurrences: Names,
    names: Names,
    render_count: u32,
}

impl Dataset {
    /// Prepare this dataset as a statement of the given kind.
    pub fn prepare(&self, kind: StatementKind) -> QueryResult<PreparedStatement> {
        PreparedStatement::new(self.clone(), kind)
    }
}

impl PreparedStatement {
    /// Render a dataset into a prepared statement.
    pub fn new(dataset: Dataset, kind: StatementKind) -> QueryResult<Self> {
        let mut statement = Self {
            dataset,
            kind,
            sql: Arc::from(""),
            occurrences: Names::new(),
            names: Names::new(),
            render_count: 0,
        };
        statement.render()?;
        debug!(
            kind = statement.kind.as_str(),
            placeholders = statement.names.len(),
            sql = %statement.sql,
            "Prepared statement"
        );
        Ok(statement)
    }

    fn render(&mut self) -> QueryResult<()> {
        let dialect = *self.dataset.dialect();
        let mut renderer = Renderer::new(&dialect);
        let mut sql = String::new();
        match &self.kind {
            StatementKind::Select => self.dataset.write_select(&mut renderer, &mut sql)?,
            StatementKind::Insert(pairs) => {
                let (columns, values): (Vec<String>, Vec<Expr>) = pairs.iter().cloned().unzip();
                self.dataset.write_insert(
                    &mut renderer,
                    &mut sql,
                    &columns,
                    std::slice::from_ref(&values),
                )?
            }
            StatementKind::Update(pairs) => {
                self.dataset.write_update(&mut renderer, &mut sql, pairs)?
            }
            StatementKind::Delete => self.dataset.write_delete(&mut renderer, &mut sql)?,
        }

        self.occurrences = renderer.occurrences().iter().cloned().collect();
        self.names = renderer.names().map(str::to_string).collect();
        self.sql = Arc::from(sql);
        self.render_count += 1;
        Ok(())
    }

    /// Render the statement again for another dialect.
    ///
    /// On failure the statement keeps its previous dialect and SQL.
    pub fn set_dialect(&mut self, dialect: Dialect) -> QueryResult<()> {
        let retargeted = self.dataset.with_dialect(dialect);
        let previous = std::mem::replace(&mut self.dataset, retargeted);
        if let Err(err) = self.render() {
            self.dataset = previous;
            return Err(err);
        }
        debug!(dialect = dialect.name, sql = %self.sql, "Prepared statement retargeted");
        Ok(())
    }

    /// The rendered SQL.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The rendered SQL as a shared string.
    pub fn shared_sql(&self) -> Arc<str> {
        Arc::clone(&self.sql)
    }

    /// The statement kind.
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// The prepared dataset.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Distinct placeholder names in first-appearance order.
    pub fn placeholders(&self) -> &[String] {
        &self.names
    }

    /// How many times the SQL was rendered. Binding never renders.
    pub fn render_count(&self) -> u32 {
        self.render_count
    }

    /// Embed this statement as a subquery. Its placeholders join the
    /// enclosing statement's namespace and numbering.
    pub fn as_subquery(&self) -> QueryResult<Expr> {
        if !self.kind.returns_rows() {
            return Err(QueryError::invalid_operation(
                self.kind.as_str(),
                "only SELECT statements can be used as subqueries",
            ));
        }
        Ok(Expr::Subquery(Box::new(self.dataset.clone())))
    }

    /// Map named values onto the statement's markers.
    ///
    /// Every placeholder needs a value; extra values are ignored.
    pub fn bind<K, V>(&self, args: impl IntoIterator<Item = (K, V)>) -> QueryResult<BoundArguments>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let args: IndexMap<String, Value> = args
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let lookup = |name: &String| {
            args.get(name).cloned().ok_or_else(|| {
                QueryError::missing_bind_argument(name.as_str()).with_sql(self.sql.to_string())
            })
        };

        Ok(match self.dataset.dialect().placeholder_style {
            PlaceholderStyle::Question => BoundArguments::Positional(
                self.occurrences.iter().map(lookup).collect::<QueryResult<_>>()?,
            ),
            PlaceholderStyle::Numbered => BoundArguments::Positional(
                self.names.iter().map(lookup).collect::<QueryResult<_>>()?,
            ),
            PlaceholderStyle::Colon | PlaceholderStyle::At => BoundArguments::Named(
                self.names
                    .iter()
                    .map(|name| Ok((name.clone(), lookup(name)?)))
                    .collect::<QueryResult<_>>()?,
            ),
        })
    }

    /// Bind the values and run the statement.
    pub async fn call<E, K, V>(
        &self,
        executor: &E,
        args: impl IntoIterator<Item = (K, V)>,
    ) -> QueryResult<CallOutput>
    where
        E: Executor + ?Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        let bound = self.bind(args)?;
        if self.kind.returns_rows() {
            Ok(CallOutput::Rows(executor.query(&self.sql, bound).await?))
        } else {
            Ok(CallOutput::Executed(executor.execute(&self.sql, bound).await?))
        }
    }
}

/// What a prepared statement call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutput {
    /// Rows of a SELECT.
    Rows(Vec<Row>),
    /// Outcome of an INSERT, UPDATE or DELETE.
    Executed(ExecuteResult),
}

impl CallOutput {
    /// The rows, empty for modifying statements.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Executed(_) => Vec::new(),
        }
    }

    /// Affected rows, or the number of rows returned by a SELECT.
    pub fn rows_affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Executed(result) => result.rows_affected,
        }
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Lookups that found a statement.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Statements registered (including replacements).
    pub registered: u64,
    /// Statements currently registered.
    pub size: usize,
}

impl RegistryStats {
    /// Fraction of lookups that hit.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Named prepared statements for one session.
#[derive(Debug, Default)]
pub struct StatementRegistry {
    statements: RwLock<HashMap<String, Arc<PreparedStatement>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    registered: AtomicU64,
}

impl StatementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement under a name, replacing any previous one.
    pub fn register(
        &self,
        name: impl Into<String>,
        statement: PreparedStatement,
    ) -> Arc<PreparedStatement> {
        let name = name.into();
        let statement = Arc::new(statement);
        let replaced = self
            .statements
            .write()
            .insert(name.clone(), Arc::clone(&statement))
            .is_some();
        self.registered.fetch_add(1, Ordering::Relaxed);
        debug!(name = %name, replaced, "Registered prepared statement");
        statement
    }

    /// Look up a statement.
    pub fn get(&self, name: &str) -> Option<Arc<PreparedStatement>> {
        let found = self.statements.read().get(name).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Run a registered statement.
    pub async fn call<E, K, V>(
        &self,
        name: &str,
        executor: &E,
        args: impl IntoIterator<Item = (K, V)>,
    ) -> QueryResult<CallOutput>
    where
        E: Executor + ?Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        let statement = self.get(name).ok_or_else(|| {
            QueryError::invalid_operation("call", format!("no prepared statement named '{}'", name))
                .with_suggestion("Register the statement before calling it")
        })?;
        statement.call(executor, args).await
    }

    /// Remove a statement.
    pub fn remove(&self, name: &str) -> Option<Arc<PreparedStatement>> {
        self.statements.write().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.statements.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered statements.
    pub fn len(&self) -> usize {
        self.statements.read().len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every statement.
    pub fn clear(&self) {
        self.statements.write().clear();
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::executor::mock::{row, MockExecutor};
    use crate::expr::{col, placeholder};
    use pretty_assertions::assert_eq;

    fn by_name_and_alias(dialect: Dialect) -> PreparedStatement {
        Dataset::table("items")
            .with_dialect(dialect)
            .filter(col("name").eq(placeholder("n")) | col("alias").eq(placeholder("n")))
            .filter(col("price").lt(placeholder("max")))
            .prepare(StatementKind::Select)
            .unwrap()
    }

    #[test]
    fn test_renders_once_for_many_bindings() {
        let statement = by_name_and_alias(Dialect::POSTGRES);
        let sql = statement.shared_sql();

        let first = statement.bind([("n", Value::from("bolt")), ("max", Value::Int(5))]);
        let second = statement.bind([("n", Value::from("nut")), ("max", Value::Int(9))]);
        assert_eq!(
            first.unwrap(),
            BoundArguments::Positional(vec![Value::from("bolt"), Value::Int(5)])
        );
        assert_eq!(
            second.unwrap(),
            BoundArguments::Positional(vec![Value::from("nut"), Value::Int(9)])
        );
        assert_eq!(statement.render_count(), 1);
        assert!(Arc::ptr_eq(&sql, &statement.shared_sql()));
    }

    #[test]
    fn test_set_dialect_renders_again() {
        let mut statement = by_name_and_alias(Dialect::POSTGRES);
        statement.bind([("n", "a"), ("max", "b")]).unwrap();
        assert_eq!(statement.render_count(), 1);

        statement.set_dialect(Dialect::MSSQL).unwrap();
        assert_eq!(statement.render_count(), 2);
        assert_eq!(
            statement.sql(),
            "SELECT * FROM [items] WHERE ((([name] = @n) OR ([alias] = @n)) AND ([price] < @max))"
        );
        statement.bind([("n", "a"), ("max", "b")]).unwrap();
        assert_eq!(statement.render_count(), 2);
    }

    #[test]
    fn test_failed_set_dialect_keeps_statement() {
        let mut statement = Dataset::table("items")
            .intersect(&Dataset::table("archived"))
            .filter(col("id").eq(placeholder("id")))
            .prepare(StatementKind::Select)
            .unwrap();
        let before = statement.shared_sql();

        let err = statement.set_dialect(Dialect::MYSQL).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedClause);
        assert_eq!(statement.render_count(), 1);
        assert!(Arc::ptr_eq(&before, &statement.shared_sql()));
        assert_eq!(statement.dataset().dialect(), &Dialect::GENERIC);
    }

    #[test]
    fn test_placeholder_styles() {
        let numbered = by_name_and_alias(Dialect::POSTGRES);
        assert_eq!(
            numbered.sql(),
            "SELECT * FROM \"items\" WHERE (((\"name\" = $1) OR (\"alias\" = $1)) AND (\"price\" < $2))"
        );

        let question = by_name_and_alias(Dialect::GENERIC);
        assert_eq!(
            question.sql(),
            "SELECT * FROM items WHERE (((name = ?) OR (alias = ?)) AND (price < ?))"
        );
        assert_eq!(
            question.bind([("n", "x"), ("max", "y")]).unwrap(),
            BoundArguments::Positional(vec!["x".into(), "x".into(), "y".into()])
        );

        let named = by_name_and_alias(Dialect::ORACLE);
        assert!(named.sql().contains("(\"NAME\" = :n)"));
        assert_eq!(
            named.bind([("max", 1), ("n", 2), ("unused", 3)]).unwrap(),
            BoundArguments::Named(vec![
                ("n".to_string(), Value::Int(2)),
                ("max".to_string(), Value::Int(1)),
            ])
        );

        let at = by_name_and_alias(Dialect::MSSQL);
        assert!(at.sql().contains("[price] < @max"));
        assert_eq!(at.placeholders(), &["n".to_string(), "max".to_string()]);
    }

    #[test]
    fn test_missing_argument_names_placeholder() {
        let statement = by_name_and_alias(Dialect::POSTGRES);
        let err = statement.bind([("n", "bolt")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingBindArgument);
        assert_eq!(err.context.placeholder.as_deref(), Some("max"));
        assert!(err.to_string().contains(":max"));
    }

    #[test]
    fn test_subquery_shares_numbering() {
        let customer_orders = Dataset::table("orders")
            .with_dialect(Dialect::POSTGRES)
            .select(["item_id"])
            .filter(col("customer_id").eq(placeholder("customer")))
            .prepare(StatementKind::Select)
            .unwrap();
        assert_eq!(
            customer_orders.sql(),
            "SELECT \"item_id\" FROM \"orders\" WHERE (\"customer_id\" = $1)"
        );

        let outer = Dataset::table("items")
            .with_dialect(Dialect::POSTGRES)
            .filter(col("owner").eq(placeholder("owner")))
            .filter(col("id").in_list(customer_orders.as_subquery().unwrap()))
            .prepare(StatementKind::Select)
            .unwrap();
        assert_eq!(
            outer.sql(),
            "SELECT * FROM \"items\" WHERE ((\"owner\" = $1) AND (\"id\" IN \
             (SELECT \"item_id\" FROM \"orders\" WHERE (\"customer_id\" = $2))))"
        );
        assert_eq!(
            outer.bind([("customer", 4), ("owner", 1)]).unwrap(),
            BoundArguments::Positional(vec![Value::Int(1), Value::Int(4)])
        );
    }

    #[test]
    fn test_modifying_statements() {
        let items = Dataset::table("items").filter(col("id").eq(placeholder("id")));
        let update = items
            .prepare(StatementKind::update([("price", placeholder("price"))]))
            .unwrap();
        assert_eq!(update.sql(), "UPDATE items SET price = ? WHERE (id = ?)");
        assert_eq!(
            update.bind([("id", 3), ("price", 10)]).unwrap(),
            BoundArguments::Positional(vec![Value::Int(10), Value::Int(3)])
        );

        let insert = Dataset::table("items")
            .prepare(StatementKind::insert([("name", placeholder("name"))]))
            .unwrap();
        assert_eq!(insert.sql(), "INSERT INTO items (name) VALUES (?)");

        let delete = items.prepare(StatementKind::Delete).unwrap();
        assert_eq!(delete.sql(), "DELETE FROM items WHERE (id = ?)");
        assert!(delete.as_subquery().is_err());
    }

    #[test]
    fn test_invalid_dataset_fails_at_prepare() {
        let err = Dataset::table("items")
            .group(["a"])
            .prepare(StatementKind::Delete)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
    }

    #[tokio::test]
    async fn test_call_through_executor() {
        let exec = MockExecutor::with_rows(vec![row(&[("id", Value::Int(1))])]);
        let statement = by_name_and_alias(Dialect::GENERIC);
        let output = statement
            .call(&exec, [("n", Value::from("a")), ("max", Value::Int(2))])
            .await
            .unwrap();
        assert_eq!(output.rows_affected(), 1);
        let recorded = exec.statements.lock();
        assert_eq!(recorded[0].0, statement.sql());
        assert_eq!(recorded[0].1.len(), 3);
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = StatementRegistry::new();
        registry.register("by_name", by_name_and_alias(Dialect::GENERIC));
        assert_eq!(registry.names(), vec!["by_name".to_string()]);
        assert!(registry.get("by_name").is_some());
        assert!(registry.get("missing").is_none());

        let exec = MockExecutor::default();
        let rows = registry
            .call("by_name", &exec, [("n", 1), ("max", 2)])
            .await
            .unwrap()
            .into_rows();
        assert!(rows.is_empty());
        let err = registry
            .call("nope", &exec, Vec::<(String, Value)>::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);

        let stats = registry.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_rate(), 0.5);

        assert!(registry.remove("by_name").is_some());
        assert!(registry.is_empty());
    }
}
