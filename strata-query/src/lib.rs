//! # strata-query
//!
//! Dataset query builder, dialect-aware SQL rendering and connection
//! management for strata.
//!
//! This crate provides:
//! - Immutable [`Dataset`] query descriptors compiled to SELECT, INSERT,
//!   UPDATE and DELETE
//! - A closed expression tree ([`Expr`]) rendered per [`Dialect`]; the literal
//!   renderer is the only place values become SQL text
//! - Prepared statements with dialect-specific placeholders
//! - A reentrant, bounded [`ConnectionPool`]
//! - Transactions and savepoints over pooled connections
//!
//! ## Datasets
//!
//! ```rust
//! use strata_query::{col, Dataset, Dialect};
//!
//! let items = Dataset::table("items")
//!     .filter([("status", "active")])
//!     .order([col("price").desc()])
//!     .limit(10)
//!     .unwrap();
//!
//! assert_eq!(
//!     items.select_sql().unwrap(),
//!     "SELECT * FROM items WHERE (status = 'active') ORDER BY price DESC LIMIT 10"
//! );
//! assert_eq!(
//!     items.with_dialect(Dialect::MSSQL).select_sql().unwrap(),
//!     "SELECT TOP 10 * FROM [items] WHERE ([status] = 'active') ORDER BY [price] DESC"
//! );
//! ```
//!
//! ## Rendering Expressions
//!
//! ```rust
//! use strata_query::{col, lit, render, Dialect};
//!
//! let expr = col("name").eq(lit("O'Brien"));
//! assert_eq!(render(&expr, &Dialect::GENERIC).unwrap(), "(name = 'O''Brien')");
//! ```
//!
//! ## Connection Pool
//!
//! ```rust
//! use strata_query::{CallerId, ConnectionPool, PoolOptions, QueryError};
//!
//! let pool = ConnectionPool::from_options(&PoolOptions::new(), || Ok(42_u32)).unwrap();
//! let value = pool
//!     .hold(CallerId::current(), |conn| Ok::<_, QueryError>(*conn + 1))
//!     .unwrap();
//! assert_eq!(value, 43);
//! assert_eq!(pool.available_connections(), 1);
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use strata_query::{Dataset, ErrorCode};
//!
//! let err = Dataset::table("items").having([("n", 1)]).unwrap_err();
//! assert_eq!(err.code, ErrorCode::InvalidOperation);
//! ```

pub mod condition;
pub mod config;
pub mod connection;
pub mod dataset;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod expr;
pub mod logging;
pub mod pagination;
pub mod pool;
pub mod prepared;
pub mod render;
pub mod transaction;
pub mod value;

pub use condition::Condition;
pub use config::{LoggingConfig, StrataConfig};
pub use connection::{ConnectionString, Driver, EnvExpander, PoolOptions};
pub use dataset::{
    AggregateFunction, By, Compound, Dataset, Distinct, JoinClause, JoinCondition, JoinKind,
    LockMode, LockStrength, LockWait, SetOperation,
};
pub use dialect::{Dialect, LimitStyle, PlaceholderStyle, QuotePolicy};
pub use error::{BoxError, ErrorCode, ErrorContext, QueryError, QueryResult};
pub use executor::{BoundArguments, ExecuteResult, Executor, Row};
pub use expr::{
    case, col, count_all, func, lit, placeholder, qualified, raw, raw_with, star, Expr,
    IntoColumn, NullsOrder, Operator,
};
pub use pagination::{PaginatedDataset, PaginatedResult};
pub use pool::{CallerId, ConnectionPool, PoolStatus, SingleConnectionPool, ThreadedPool};
pub use prepared::{CallOutput, PreparedStatement, RegistryStats, StatementKind, StatementRegistry};
pub use render::render;
pub use transaction::{
    AccessMode, IsolationLevel, TransactionConfig, TransactionManager, TransactionOptions,
    TransactionalConnection,
};
pub use value::Value;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dataset::Dataset;
    pub use crate::dialect::Dialect;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{Executor, Row};
    pub use crate::expr::{col, func, lit, placeholder, qualified, Expr};
    pub use crate::pool::{CallerId, ConnectionPool};
    pub use crate::prepared::{PreparedStatement, StatementKind, StatementRegistry};
    pub use crate::transaction::{TransactionManager, TransactionOptions};
    pub use crate::value::Value;
}
