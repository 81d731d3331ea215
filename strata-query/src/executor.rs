//! The executor seam.
//!
//! strata renders SQL and binds arguments; an [`Executor`] sends the result
//! to a database and converts rows back into [`Value`]s. Backend drivers
//! implement this trait outside the crate.
//!
//! ```rust,ignore
//! impl Executor for MyDriver {
//!     fn query<'a>(&'a self, sql: &'a str, args: BoundArguments)
//!         -> BoxFuture<'a, QueryResult<Vec<Row>>>
//!     {
//!         Box::pin(async move { self.client.fetch(sql, args).await })
//!     }
//!     // ...
//! }
//! ```

pub use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::error::QueryResult;
use crate::value::Value;

/// A result row: column name to value, in select-list order.
pub type Row = IndexMap<String, Value>;

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// Number of rows affected.
    pub rows_affected: u64,
    /// Generated key of the last inserted row, if the backend reports one.
    pub last_insert_id: Option<i64>,
}

impl ExecuteResult {
    /// Create a result with an affected row count.
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    /// Set the generated key.
    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }
}

/// Values bound to a rendered statement's placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundArguments {
    /// One value per marker, in marker order (`?`, `$n`).
    Positional(Vec<Value>),
    /// One value per distinct placeholder name (`:name`, `@name`).
    Named(Vec<(String, Value)>),
}

impl BoundArguments {
    /// No arguments.
    pub fn none() -> Self {
        Self::Positional(Vec::new())
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    /// Check if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Named(values) => values.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            Self::Positional(_) => None,
        }
    }
}

impl Default for BoundArguments {
    fn default() -> Self {
        Self::none()
    }
}

/// Sends rendered SQL to a database.
pub trait Executor: Send + Sync {
    /// Run a statement that returns rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: BoundArguments,
    ) -> BoxFuture<'a, QueryResult<Vec<Row>>>;

    /// Run a statement that modifies rows.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        args: BoundArguments,
    ) -> BoxFuture<'a, QueryResult<ExecuteResult>>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        args: BoundArguments,
    ) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
        (**self).query(sql, args)
    }

    fn execute<'a>(
        &'a self,
        sql: &'a str,
        args: BoundArguments,
    ) -> BoxFuture<'a, QueryResult<ExecuteResult>> {
        (**self).execute(sql, args)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;

    /// Records every statement and answers with canned rows.
    #[derive(Default)]
    pub(crate) struct MockExecutor {
        pub(crate) statements: Mutex<Vec<(String, BoundArguments)>>,
        pub(crate) rows: Mutex<Vec<Row>>,
        pub(crate) affected: u64,
    }

    impl MockExecutor {
        pub(crate) fn with_rows(rows: Vec<Row>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        pub(crate) fn sql(&self) -> Vec<String> {
            self.statements.lock().iter().map(|(s, _)| s.clone()).collect()
        }
    }

    impl Executor for MockExecutor {
        fn query<'a>(
            &'a self,
            sql: &'a str,
            args: BoundArguments,
        ) -> BoxFuture<'a, QueryResult<Vec<Row>>> {
            Box::pin(async move {
                self.statements.lock().push((sql.to_string(), args));
                Ok(self.rows.lock().clone())
            })
        }

        fn execute<'a>(
            &'a self,
            sql: &'a str,
            args: BoundArguments,
        ) -> BoxFuture<'a, QueryResult<ExecuteResult>> {
            Box::pin(async move {
                self.statements.lock().push((sql.to_string(), args));
                Ok(ExecuteResult::new(self.affected).with_last_insert_id(1))
            })
        }
    }

    pub(crate) fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}
