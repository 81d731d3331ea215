//! # Strata
//!
//! A connection pool and dialect-aware SQL dataset builder.
//!
//! Strata provides:
//! - Immutable datasets that compile to SELECT, INSERT, UPDATE and DELETE
//! - One literal renderer per dialect as the single path from values to SQL
//! - Prepared statements with `?`, `$n`, `:name` or `@name` placeholders
//! - A bounded, reentrant connection pool with blocking acquisition
//! - Transactions with savepoints
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let recent = Dataset::table("orders")
//!     .with_dialect(Dialect::POSTGRES)
//!     .filter(col("customer_id").eq(placeholder("customer")))
//!     .order([col("created_at").desc()]);
//!
//! let stmt = recent.prepare(StatementKind::Select).unwrap();
//! assert_eq!(
//!     stmt.sql(),
//!     "SELECT * FROM \"orders\" WHERE (\"customer_id\" = $1) ORDER BY \"created_at\" DESC"
//! );
//! ```
//!
//! Executing statements goes through an [`Executor`](prelude::Executor)
//! supplied by a database adapter.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The query engine crate.
pub mod query {
    pub use strata_query::*;
}

pub use strata_query::{
    config, connection, dataset, dialect, error, executor, expr, logging, pagination, pool,
    prepared, render, transaction, value,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use strata_query::prelude::*;
}

// Re-export key types at the crate root
pub use strata_query::{
    col, lit, placeholder, CallerId, ConnectionPool, Dataset, Dialect, ErrorCode, Executor,
    PreparedStatement, QueryError, QueryResult, StatementKind, StatementRegistry, StrataConfig,
    TransactionManager, Value,
};
