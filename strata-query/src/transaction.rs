//! Transactions and savepoints over pooled connections.
//!
//! [`TransactionManager::transaction`] runs a closure inside a transaction on
//! the caller's pooled connection:
//! - Commits when the closure returns `Ok`
//! - Rolls back on `Err` or panic
//! - Swallows the [`QueryError::rollback`] signal and returns `Ok(None)`
//! - Nests with savepoints when [`TransactionOptions::savepoint`] is requested
//!
//! Depth 1 uses `BEGIN`/`COMMIT`/`ROLLBACK`; deeper levels use
//! `SAVEPOINT`/`RELEASE SAVEPOINT`/`ROLLBACK TO SAVEPOINT` (or the SQL Server
//! forms, chosen by the dialect).
//!
//! # Isolation Levels
//!
//! ```rust
//! use strata_query::{Dialect, IsolationLevel, TransactionConfig};
//!
//! assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
//!
//! // BEGIN stays plain unless something is requested.
//! let config = TransactionConfig::new();
//! assert_eq!(config.begin_statements(&Dialect::POSTGRES), vec!["BEGIN"]);
//!
//! let config = TransactionConfig::new()
//!     .isolation(IsolationLevel::Serializable)
//!     .read_only();
//! assert_eq!(
//!     config.begin_statements(&Dialect::POSTGRES),
//!     vec!["BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY"]
//! );
//! assert_eq!(
//!     config.begin_statements(&Dialect::MYSQL),
//!     vec!["SET TRANSACTION ISOLATION LEVEL SERIALIZABLE, READ ONLY", "BEGIN"]
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::dialect::{Dialect, IsolationStyle, TransactionSyntax};
use crate::error::{QueryError, QueryResult};
use crate::pool::{CallerId, ConnectionPool};

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// Read uncommitted - allows dirty reads.
    ReadUncommitted,
    /// Read committed - prevents dirty reads.
    ReadCommitted,
    /// Repeatable read - prevents non-repeatable reads.
    RepeatableRead,
    /// Serializable - highest isolation level.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL clause for this isolation level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Access mode for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read-write access.
    ReadWrite,
    /// Read-only access.
    ReadOnly,
}

impl AccessMode {
    /// Get the SQL clause for this access mode.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadWrite => "READ WRITE",
            Self::ReadOnly => "READ ONLY",
        }
    }
}

/// Options applied when a transaction begins. Unset options are left to the
/// server's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Isolation level.
    pub isolation: Option<IsolationLevel>,
    /// Access mode.
    pub access_mode: Option<AccessMode>,
    /// Defer constraint checking (only with SERIALIZABLE READ ONLY).
    pub deferrable: bool,
}

impl TransactionConfig {
    /// Create a config that leaves everything to the server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Set the access mode.
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    /// Make the transaction read-only.
    pub fn read_only(self) -> Self {
        self.access_mode(AccessMode::ReadOnly)
    }

    /// Make the transaction deferrable.
    pub fn deferrable(mut self) -> Self {
        self.deferrable = true;
        self
    }

    fn characteristics(&self, dialect: &Dialect) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(level) = self.isolation {
            parts.push(format!("ISOLATION LEVEL {}", level.as_sql()));
        }
        // SQL Server has no transaction access modes.
        if dialect.transaction_syntax != TransactionSyntax::SqlServer {
            if let Some(mode) = self.access_mode {
                parts.push(mode.as_sql().to_string());
            }
        }
        if self.deferrable
            && self.isolation == Some(IsolationLevel::Serializable)
            && self.access_mode == Some(AccessMode::ReadOnly)
            && dialect.isolation_style == IsolationStyle::InBegin
        {
            parts.push("DEFERRABLE".to_string());
        }
        parts
    }

    /// The statements that open a transaction on `dialect`.
    pub fn begin_statements(&self, dialect: &Dialect) -> Vec<String> {
        let begin = match dialect.transaction_syntax {
            TransactionSyntax::Standard => "BEGIN",
            TransactionSyntax::SqlServer => "BEGIN TRANSACTION",
        };
        let parts = self.characteristics(dialect);
        if parts.is_empty() {
            return vec![begin.to_string()];
        }

        match dialect.isolation_style {
            IsolationStyle::InBegin => vec![format!("{} {}", begin, parts.join(" "))],
            IsolationStyle::SetTransaction => vec![
                format!("SET TRANSACTION {}", parts.join(", ")),
                begin.to_string(),
            ],
            IsolationStyle::Unsupported => {
                debug!(dialect = dialect.name, "Transaction options ignored");
                vec![begin.to_string()]
            }
        }
    }
}

/// Options for a single [`TransactionManager::transaction`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Open a savepoint when already inside a transaction.
    pub savepoint: bool,
    /// Options for the outermost BEGIN.
    pub config: TransactionConfig,
}

impl TransactionOptions {
    /// Default options: join an enclosing transaction if there is one.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a savepoint when nested.
    pub fn savepoint(mut self) -> Self {
        self.savepoint = true;
        self
    }

    /// Set the BEGIN options.
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for an isolation level on BEGIN.
    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.config = self.config.isolation(level);
        self
    }
}

/// A connection that accepts transaction control statements.
pub trait TransactionalConnection {
    /// Run a control statement such as `BEGIN` or `SAVEPOINT x`.
    fn execute_control(&self, sql: &str) -> QueryResult<()>;
}

/// Control statements for one nesting level.
struct Level {
    depth: usize,
    savepoint: Option<String>,
}

impl Level {
    fn commit_sql(&self, dialect: &Dialect) -> Option<String> {
        match (&self.savepoint, dialect.transaction_syntax) {
            (None, TransactionSyntax::Standard) => Some("COMMIT".to_string()),
            (None, TransactionSyntax::SqlServer) => Some("COMMIT TRANSACTION".to_string()),
            (Some(name), TransactionSyntax::Standard) => Some(format!("RELEASE SAVEPOINT {name}")),
            // SQL Server savepoints are released with the enclosing transaction.
            (Some(_), TransactionSyntax::SqlServer) => None,
        }
    }

    fn rollback_sql(&self, dialect: &Dialect) -> String {
        match (&self.savepoint, dialect.transaction_syntax) {
            (None, TransactionSyntax::Standard) => "ROLLBACK".to_string(),
            (None, TransactionSyntax::SqlServer) => "ROLLBACK TRANSACTION".to_string(),
            (Some(name), TransactionSyntax::Standard) => format!("ROLLBACK TO SAVEPOINT {name}"),
            (Some(name), TransactionSyntax::SqlServer) => format!("ROLLBACK TRANSACTION {name}"),
        }
    }
}

/// Rolls back and pops a level unless it finished normally.
struct LevelGuard<'a, C: TransactionalConnection> {
    manager: &'a TransactionManager<C>,
    caller: CallerId,
    conn: &'a C,
    level: Level,
    finished: bool,
}

impl<C: TransactionalConnection> LevelGuard<'_, C> {
    fn rollback(&self) {
        let sql = self.level.rollback_sql(&self.manager.dialect);
        if let Err(e) = self.conn.execute_control(&sql) {
            error!(
                caller = self.caller.as_u64(),
                depth = self.level.depth,
                error = %e,
                "Rollback failed"
            );
        }
    }
}

impl<C: TransactionalConnection> Drop for LevelGuard<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
        self.manager.pop(self.caller);
    }
}

/// Coordinates transactions and savepoints per caller.
pub struct TransactionManager<C> {
    pool: Arc<ConnectionPool<C>>,
    dialect: Dialect,
    depths: Mutex<HashMap<CallerId, usize>>,
}

impl<C> std::fmt::Debug for TransactionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("dialect", &self.dialect.name)
            .field("active", &self.depths.lock().len())
            .finish()
    }
}

impl<C: TransactionalConnection> TransactionManager<C> {
    /// Create a manager over a pool.
    pub fn new(pool: Arc<ConnectionPool<C>>, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            depths: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    /// The dialect used for control statements.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Check if the caller is inside a transaction.
    pub fn in_transaction(&self, caller: CallerId) -> bool {
        self.depth(caller) > 0
    }

    /// Current nesting depth for the caller (0 when idle).
    pub fn depth(&self, caller: CallerId) -> usize {
        self.depths.lock().get(&caller).copied().unwrap_or(0)
    }

    fn push(&self, caller: CallerId) -> usize {
        let mut depths = self.depths.lock();
        let depth = depths.entry(caller).or_insert(0);
        *depth += 1;
        *depth
    }

    fn pop(&self, caller: CallerId) {
        let mut depths = self.depths.lock();
        if let Some(depth) = depths.get_mut(&caller) {
            *depth -= 1;
            if *depth == 0 {
                depths.remove(&caller);
            }
        }
    }

    /// Run `body` in a transaction on the caller's connection.
    ///
    /// Inside an enclosing transaction the body joins it, unless
    /// `options.savepoint` opens a nested savepoint. Returns `Ok(None)` when
    /// the body asked for a rollback with [`QueryError::rollback`].
    pub fn transaction<T, F>(
        &self,
        caller: CallerId,
        options: TransactionOptions,
        body: F,
    ) -> QueryResult<Option<T>>
    where
        F: FnOnce(&C) -> QueryResult<T>,
    {
        self.pool.hold(caller, |conn| {
            let current = self.depth(caller);
            if current > 0 && !options.savepoint {
                return body(conn).map(Some);
            }
            self.run_level(caller, conn, &options.config, body)
        })
    }

    fn run_level<T, F>(
        &self,
        caller: CallerId,
        conn: &C,
        config: &TransactionConfig,
        body: F,
    ) -> QueryResult<Option<T>>
    where
        F: FnOnce(&C) -> QueryResult<T>,
    {
        let depth = self.depth(caller) + 1;
        let level = Level {
            depth,
            savepoint: (depth > 1).then(|| format!("autopoint_{}", depth - 1)),
        };

        let opening = match (&level.savepoint, self.dialect.transaction_syntax) {
            (None, _) => config.begin_statements(&self.dialect),
            (Some(name), TransactionSyntax::Standard) => vec![format!("SAVEPOINT {name}")],
            (Some(name), TransactionSyntax::SqlServer) => vec![format!("SAVE TRANSACTION {name}")],
        };
        for sql in &opening {
            conn.execute_control(sql)
                .map_err(|e| QueryError::transaction(e.message.clone()).with_sql(sql.clone()).with_source(e))?;
        }
        debug!(caller = caller.as_u64(), depth, "Transaction level opened");

        self.push(caller);
        let mut guard = LevelGuard {
            manager: self,
            caller,
            conn,
            level,
            finished: false,
        };

        match body(conn) {
            Ok(value) => {
                if let Some(sql) = guard.level.commit_sql(&self.dialect) {
                    if let Err(e) = conn.execute_control(&sql) {
                        // The guard rolls back on drop.
                        return Err(QueryError::transaction(e.message.clone())
                            .with_sql(sql)
                            .with_source(e));
                    }
                }
                guard.finished = true;
                debug!(caller = caller.as_u64(), depth, "Transaction level committed");
                Ok(Some(value))
            }
            Err(e) => {
                guard.rollback();
                guard.finished = true;
                debug!(caller = caller.as_u64(), depth, code = %e.code, "Transaction level rolled back");
                if e.is_rollback() { Ok(None) } else { Err(e) }
            }
        }
    }
}
