//! Thread-safe connection pools.
//!
//! A pool owns opaque connection handles produced by a factory and lends them
//! to callers identified by a [`CallerId`]. Two variants exist:
//!
//! - [`ThreadedPool`]: bounded population, lazy creation, reentrant
//!   acquisition by the same caller, blocking acquisition with a timeout.
//! - [`SingleConnectionPool`]: one lazily created handle shared by every
//!   caller (in-memory SQLite, tests).
//!
//! [`hold`](ThreadedPool::hold) is the main entry point: the handle is
//! released on every exit path, including panics.
//!
//! ```rust
//! use std::time::Duration;
//! use strata_query::pool::{CallerId, ThreadedPool};
//!
//! let pool = ThreadedPool::new(2, || Ok(String::from("conn")))
//!     .unwrap()
//!     .with_acquire_timeout(Duration::from_millis(100));
//!
//! let caller = CallerId::new();
//! let len = pool
//!     .hold(caller, |conn| Ok::<_, strata_query::QueryError>(conn.len()))
//!     .unwrap();
//! assert_eq!(len, 4);
//! assert_eq!(pool.available_connections(), 1);
//! assert_eq!(pool.created_count(), 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::connection::PoolOptions;
use crate::error::{BoxError, QueryError, QueryResult};

/// Creates a new connection.
pub type ConnectionFactory<C> = Box<dyn Fn() -> Result<C, BoxError> + Send + Sync>;

/// Closes a connection that is leaving the pool.
pub type ConnectionCloser<C> = Box<dyn Fn(&C) -> Result<(), BoxError> + Send + Sync>;

/// Default time [`ThreadedPool::acquire`] waits for a free connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_CALLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical caller (a thread, task or request).
///
/// Acquisitions by the same caller are reentrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(u64);

impl CallerId {
    /// Mint a fresh id.
    pub fn new() -> Self {
        Self(NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// A stable id for the current thread.
    pub fn current() -> Self {
        thread_local! {
            static CURRENT: CallerId = CallerId::new();
        }
        CURRENT.with(|id| *id)
    }

    /// The numeric id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum population.
    pub max_size: usize,
    /// Connections in existence (idle + allocated + being created).
    pub size: usize,
    /// Idle connections.
    pub available: usize,
    /// Connections lent to callers.
    pub allocated: usize,
    /// Connections currently being created.
    pub creating: usize,
    /// Successful factory invocations since the pool was created.
    pub created_count: u64,
}

struct Lease<C> {
    conn: Arc<C>,
    depth: usize,
}

struct PoolState<C> {
    available: Vec<Arc<C>>,
    allocated: HashMap<CallerId, Lease<C>>,
    creating: usize,
}

impl<C> PoolState<C> {
    fn size(&self) -> usize {
        self.available.len() + self.allocated.len() + self.creating
    }
}

fn close_all<C>(closer: Option<&ConnectionCloser<C>>, conns: Vec<Arc<C>>) {
    for conn in conns {
        if let Some(close) = closer {
            if let Err(e) = close(conn.as_ref()) {
                warn!(error = %e, "Failed to close connection");
            }
        }
    }
}

/// Releases a caller's lease when dropped.
struct ReleaseGuard<'a, C> {
    pool: &'a ThreadedPool<C>,
    caller: CallerId,
}

impl<C> Drop for ReleaseGuard<'_, C> {
    fn drop(&mut self) {
        self.pool.release(self.caller);
    }
}

/// Gives back a slot reserved for connection creation when dropped, even if
/// the factory panics.
struct CreatingSlot<'a, 'g, C> {
    state: &'a mut MutexGuard<'g, PoolState<C>>,
    released: &'a Condvar,
}

impl<C> Drop for CreatingSlot<'_, '_, C> {
    fn drop(&mut self) {
        self.state.creating -= 1;
        if std::thread::panicking() {
            self.released.notify_one();
        }
    }
}

/// A bounded pool with reentrant, blocking acquisition.
pub struct ThreadedPool<C> {
    max_size: usize,
    acquire_timeout: Duration,
    factory: ConnectionFactory<C>,
    closer: Option<ConnectionCloser<C>>,
    state: Mutex<PoolState<C>>,
    released: Condvar,
    created: AtomicU64,
}

impl<C> std::fmt::Debug for ThreadedPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedPool")
            .field("max_size", &self.max_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("status", &self.status())
            .finish()
    }
}

impl<C> ThreadedPool<C> {
    /// Create a pool of at most `max_size` connections.
    pub fn new<F>(max_size: usize, factory: F) -> QueryResult<Self>
    where
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        if max_size == 0 {
            return Err(QueryError::configuration(
                "pool max_size must be at least 1",
            ));
        }
        debug!(max_size, "Connection pool created");
        Ok(Self {
            max_size,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            factory: Box::new(factory),
            closer: None,
            state: Mutex::new(PoolState {
                available: Vec::with_capacity(max_size),
                allocated: HashMap::with_capacity(max_size),
                creating: 0,
            }),
            released: Condvar::new(),
            created: AtomicU64::new(0),
        })
    }

    /// Set how long `acquire` blocks before failing with `PoolTimeout`.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set a function run on every connection leaving the pool.
    pub fn with_closer<F>(mut self, closer: F) -> Self
    where
        F: Fn(&C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.closer = Some(Box::new(closer));
        self
    }

    /// Maximum population.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Acquisition timeout.
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Acquire a connection for a caller.
    ///
    /// A caller that already holds a connection gets the same one back and
    /// must release it once per acquisition. Otherwise an idle connection is
    /// reused, a new one is created if the pool is below `max_size`, or the
    /// call blocks until another caller releases one.
    ///
    /// A zero timeout never blocks: a full pool fails with `PoolExhausted`.
    /// A timeout too large to represent as a deadline waits indefinitely.
    pub fn acquire(&self, caller: CallerId) -> QueryResult<Arc<C>> {
        let deadline = Instant::now().checked_add(self.acquire_timeout);
        let mut state = self.state.lock();

        loop {
            if let Some(lease) = state.allocated.get_mut(&caller) {
                lease.depth += 1;
                trace!(caller = caller.as_u64(), depth = lease.depth, "Reentrant acquire");
                return Ok(Arc::clone(&lease.conn));
            }

            if let Some(conn) = state.available.pop() {
                state.allocated.insert(
                    caller,
                    Lease {
                        conn: Arc::clone(&conn),
                        depth: 1,
                    },
                );
                debug!(caller = caller.as_u64(), "Acquired idle connection");
                return Ok(conn);
            }

            if state.size() < self.max_size {
                return self.create_for(&mut state, caller);
            }

            if self.acquire_timeout.is_zero() {
                debug!(caller = caller.as_u64(), max_size = self.max_size, "Pool exhausted");
                return Err(QueryError::pool_exhausted(format!(
                    "all {} connections are in use",
                    self.max_size
                ))
                .with_suggestion("Set an acquire timeout to wait for a release"));
            }

            let Some(deadline) = deadline else {
                self.released.wait(&mut state);
                continue;
            };
            if self.released.wait_until(&mut state, deadline).timed_out() {
                warn!(
                    caller = caller.as_u64(),
                    timeout_ms = self.acquire_timeout.as_millis() as u64,
                    max_size = self.max_size,
                    "Timed out waiting for a connection"
                );
                return Err(QueryError::pool_timeout(
                    self.acquire_timeout.as_millis(),
                    self.max_size,
                ));
            }
        }
    }

    /// Reserve a slot and run the factory without holding the lock.
    fn create_for(
        &self,
        state: &mut MutexGuard<'_, PoolState<C>>,
        caller: CallerId,
    ) -> QueryResult<Arc<C>> {
        state.creating += 1;
        let result = {
            let mut slot = CreatingSlot {
                state: &mut *state,
                released: &self.released,
            };
            MutexGuard::unlocked(&mut *slot.state, || (self.factory)())
        };

        match result {
            Ok(conn) => {
                let conn = Arc::new(conn);
                let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                state.allocated.insert(
                    caller,
                    Lease {
                        conn: Arc::clone(&conn),
                        depth: 1,
                    },
                );
                debug!(caller = caller.as_u64(), created, "Created connection");
                Ok(conn)
            }
            Err(e) => {
                // The freed slot may let a waiter create its own connection.
                self.released.notify_one();
                Err(QueryError::connection(e.to_string()).with_source(e))
            }
        }
    }

    /// Release one acquisition. At depth zero the connection becomes idle.
    ///
    /// Releasing a caller that holds nothing is a no-op.
    pub fn release(&self, caller: CallerId) {
        let mut state = self.state.lock();
        let depth = match state.allocated.get_mut(&caller) {
            None => {
                warn!(caller = caller.as_u64(), "Release by a caller holding no connection");
                return;
            }
            Some(lease) => {
                lease.depth -= 1;
                lease.depth
            }
        };
        if depth > 0 {
            trace!(caller = caller.as_u64(), depth, "Reentrant release");
            return;
        }

        if let Some(lease) = state.allocated.remove(&caller) {
            state.available.push(lease.conn);
        }
        drop(state);
        self.released.notify_one();
        debug!(caller = caller.as_u64(), "Released connection");
    }

    /// Run `body` with a connection, releasing it on every exit path.
    ///
    /// The body's error is returned unchanged.
    pub fn hold<T, E, F>(&self, caller: CallerId, body: F) -> Result<T, E>
    where
        F: FnOnce(&C) -> Result<T, E>,
        E: From<QueryError>,
    {
        let conn = self.acquire(caller)?;
        let _guard = ReleaseGuard { pool: self, caller };
        body(conn.as_ref())
    }

    /// Close every idle connection. Returns the number closed.
    pub fn disconnect(&self) -> usize {
        self.disconnect_with(|_| true, |_| {})
    }

    /// Close idle connections matching `filter`, calling `on_each` before
    /// each close. Allocated connections are never touched.
    pub fn disconnect_with<F, G>(&self, filter: F, mut on_each: G) -> usize
    where
        F: Fn(&C) -> bool,
        G: FnMut(&C),
    {
        let closing: Vec<Arc<C>> = {
            let mut state = self.state.lock();
            let (closing, kept): (Vec<Arc<C>>, Vec<Arc<C>>) = state
                .available
                .drain(..)
                .partition(|conn| filter(conn.as_ref()));
            state.available = kept;
            closing
        };
        for conn in &closing {
            on_each(conn.as_ref());
        }
        let count = closing.len();
        close_all(self.closer.as_ref(), closing);
        if count > 0 {
            self.released.notify_all();
            debug!(closed = count, "Disconnected idle connections");
        }
        count
    }

    /// Drop the leases of callers that are no longer alive.
    ///
    /// Their connections are closed, never reused: the outcome of their last
    /// operation is unknown. Returns the number reaped.
    pub fn reap<F>(&self, is_alive: F) -> usize
    where
        F: Fn(CallerId) -> bool,
    {
        let reaped: Vec<(CallerId, Arc<C>)> = {
            let mut state = self.state.lock();
            let dead: Vec<CallerId> = state
                .allocated
                .keys()
                .copied()
                .filter(|caller| !is_alive(*caller))
                .collect();
            dead.into_iter()
                .filter_map(|caller| state.allocated.remove(&caller).map(|l| (caller, l.conn)))
                .collect()
        };
        for (caller, _) in &reaped {
            warn!(caller = caller.as_u64(), "Reaped connection of a dead caller");
        }
        let count = reaped.len();
        close_all(
            self.closer.as_ref(),
            reaped.into_iter().map(|(_, conn)| conn).collect(),
        );
        if count > 0 {
            self.released.notify_all();
        }
        count
    }

    /// Connections in existence.
    pub fn size(&self) -> usize {
        self.state.lock().size()
    }

    /// Idle connections.
    pub fn available_connections(&self) -> usize {
        self.state.lock().available.len()
    }

    /// Connections lent to callers.
    pub fn allocated(&self) -> usize {
        self.state.lock().allocated.len()
    }

    /// Callers currently holding a connection.
    pub fn allocated_callers(&self) -> Vec<CallerId> {
        let mut callers: Vec<CallerId> = self.state.lock().allocated.keys().copied().collect();
        callers.sort();
        callers
    }

    /// Successful factory invocations.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Status snapshot.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            max_size: self.max_size,
            size: state.size(),
            available: state.available.len(),
            allocated: state.allocated.len(),
            creating: state.creating,
            created_count: self.created_count(),
        }
    }
}

/// One lazily created connection shared by every caller.
///
/// Acquisitions are counted so that `disconnect` never closes the connection
/// while someone is using it.
pub struct SingleConnectionPool<C> {
    factory: ConnectionFactory<C>,
    closer: Option<ConnectionCloser<C>>,
    state: Mutex<SharedState<C>>,
    created: AtomicU64,
}

struct SharedState<C> {
    conn: Option<Arc<C>>,
    users: usize,
}

/// Releases a shared acquisition when dropped.
struct SharedReleaseGuard<'a, C> {
    pool: &'a SingleConnectionPool<C>,
    caller: CallerId,
}

impl<C> Drop for SharedReleaseGuard<'_, C> {
    fn drop(&mut self) {
        self.pool.release(self.caller);
    }
}

impl<C> std::fmt::Debug for SingleConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SingleConnectionPool")
            .field("connected", &state.conn.is_some())
            .field("users", &state.users)
            .field("created_count", &self.created_count())
            .finish()
    }
}

impl<C> SingleConnectionPool<C> {
    /// Create the pool. The connection is created on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            closer: None,
            state: Mutex::new(SharedState {
                conn: None,
                users: 0,
            }),
            created: AtomicU64::new(0),
        }
    }

    /// Set a function run when the connection is closed.
    pub fn with_closer<F>(mut self, closer: F) -> Self
    where
        F: Fn(&C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.closer = Some(Box::new(closer));
        self
    }

    /// The shared connection, created if needed. Never blocks on other callers.
    ///
    /// Each acquisition must be matched by a [`release`](Self::release).
    pub fn acquire(&self, _caller: CallerId) -> QueryResult<Arc<C>> {
        let mut state = self.state.lock();
        let conn = match state.conn.as_ref() {
            Some(conn) => Arc::clone(conn),
            None => {
                let created = Arc::new(
                    (self.factory)()
                        .map_err(|e| QueryError::connection(e.to_string()).with_source(e))?,
                );
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!("Created shared connection");
                state.conn = Some(Arc::clone(&created));
                created
            }
        };
        state.users += 1;
        Ok(conn)
    }

    /// End one acquisition. The connection itself stays open.
    pub fn release(&self, caller: CallerId) {
        let mut state = self.state.lock();
        match state.users.checked_sub(1) {
            Some(users) => state.users = users,
            None => warn!(caller = caller.as_u64(), "Release of an unused shared connection"),
        }
    }

    /// Run `body` with the shared connection.
    pub fn hold<T, E, F>(&self, caller: CallerId, body: F) -> Result<T, E>
    where
        F: FnOnce(&C) -> Result<T, E>,
        E: From<QueryError>,
    {
        let conn = self.acquire(caller)?;
        let _guard = SharedReleaseGuard { pool: self, caller };
        body(conn.as_ref())
    }

    /// Close the connection if it is idle and matches `filter`.
    pub fn disconnect_with<F, G>(&self, filter: F, mut on_each: G) -> usize
    where
        F: Fn(&C) -> bool,
        G: FnMut(&C),
    {
        let closing = {
            let mut state = self.state.lock();
            if state.users > 0 {
                debug!(users = state.users, "Shared connection in use, not disconnecting");
                None
            } else if state.conn.as_ref().is_some_and(|conn| filter(conn.as_ref())) {
                state.conn.take()
            } else {
                None
            }
        };
        match closing {
            Some(conn) => {
                on_each(conn.as_ref());
                close_all(self.closer.as_ref(), vec![conn]);
                1
            }
            None => 0,
        }
    }

    /// 1 once the connection exists, else 0.
    pub fn size(&self) -> usize {
        usize::from(self.state.lock().conn.is_some())
    }

    /// 1 while the connection exists and nobody holds it, else 0.
    pub fn available_connections(&self) -> usize {
        let state = self.state.lock();
        usize::from(state.conn.is_some() && state.users == 0)
    }

    /// 1 while any caller holds the connection, else 0.
    pub fn allocated(&self) -> usize {
        let state = self.state.lock();
        usize::from(state.conn.is_some() && state.users > 0)
    }

    /// Successful factory invocations.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}

/// A pool of either variant.
#[derive(Debug)]
pub enum ConnectionPool<C> {
    /// Bounded, reentrant, blocking pool.
    Threaded(ThreadedPool<C>),
    /// One shared connection.
    Single(SingleConnectionPool<C>),
}

impl<C> ConnectionPool<C> {
    /// Build the pool described by the options.
    pub fn from_options<F>(options: &PoolOptions, factory: F) -> QueryResult<Self>
    where
        F: Fn() -> Result<C, BoxError> + Send + Sync + 'static,
    {
        if options.single_connection {
            return Ok(Self::Single(SingleConnectionPool::new(factory)));
        }
        Ok(Self::Threaded(
            ThreadedPool::new(options.max_connections, factory)?
                .with_acquire_timeout(options.acquire_timeout),
        ))
    }

    /// Set a function run on every connection leaving the pool.
    pub fn with_closer<F>(self, closer: F) -> Self
    where
        F: Fn(&C) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        match self {
            Self::Threaded(pool) => Self::Threaded(pool.with_closer(closer)),
            Self::Single(pool) => Self::Single(pool.with_closer(closer)),
        }
    }

    /// Acquire a connection for a caller.
    pub fn acquire(&self, caller: CallerId) -> QueryResult<Arc<C>> {
        match self {
            Self::Threaded(pool) => pool.acquire(caller),
            Self::Single(pool) => pool.acquire(caller),
        }
    }

    /// Release one acquisition.
    pub fn release(&self, caller: CallerId) {
        match self {
            Self::Threaded(pool) => pool.release(caller),
            Self::Single(pool) => pool.release(caller),
        }
    }

    /// Run `body` with a connection, releasing it on every exit path.
    pub fn hold<T, E, F>(&self, caller: CallerId, body: F) -> Result<T, E>
    where
        F: FnOnce(&C) -> Result<T, E>,
        E: From<QueryError>,
    {
        match self {
            Self::Threaded(pool) => pool.hold(caller, body),
            Self::Single(pool) => pool.hold(caller, body),
        }
    }

    /// Close every idle connection.
    pub fn disconnect(&self) -> usize {
        self.disconnect_with(|_| true, |_| {})
    }

    /// Close idle connections matching `filter`.
    pub fn disconnect_with<F, G>(&self, filter: F, on_each: G) -> usize
    where
        F: Fn(&C) -> bool,
        G: FnMut(&C),
    {
        match self {
            Self::Threaded(pool) => pool.disconnect_with(filter, on_each),
            Self::Single(pool) => pool.disconnect_with(filter, on_each),
        }
    }

    /// Drop the leases of dead callers. The single-connection pool has none.
    pub fn reap<F>(&self, is_alive: F) -> usize
    where
        F: Fn(CallerId) -> bool,
    {
        match self {
            Self::Threaded(pool) => pool.reap(is_alive),
            Self::Single(_) => 0,
        }
    }

    /// Connections in existence.
    pub fn size(&self) -> usize {
        match self {
            Self::Threaded(pool) => pool.size(),
            Self::Single(pool) => pool.size(),
        }
    }

    /// Idle connections.
    pub fn available_connections(&self) -> usize {
        match self {
            Self::Threaded(pool) => pool.available_connections(),
            Self::Single(pool) => pool.available_connections(),
        }
    }

    /// Connections lent to callers.
    pub fn allocated(&self) -> usize {
        match self {
            Self::Threaded(pool) => pool.allocated(),
            Self::Single(pool) => pool.allocated(),
        }
    }

    /// Successful factory invocations.
    pub fn created_count(&self) -> u64 {
        match self {
            Self::Threaded(pool) => pool.created_count(),
            Self::Single(pool) => pool.created_count(),
        }
    }

    /// Status snapshot.
    pub fn status(&self) -> PoolStatus {
        match self {
            Self::Threaded(pool) => pool.status(),
            Self::Single(pool) => PoolStatus {
                max_size: 1,
                size: pool.size(),
                available: pool.available_connections(),
                allocated: pool.allocated(),
                creating: 0,
                created_count: pool.created_count(),
            },
        }
    }
}

impl<C> From<ThreadedPool<C>> for ConnectionPool<C> {
    fn from(pool: ThreadedPool<C>) -> Self {
        Self::Threaded(pool)
    }
}

impl<C> From<SingleConnectionPool<C>> for ConnectionPool<C> {
    fn from(pool: SingleConnectionPool<C>) -> Self {
        Self::Single(pool)
    }
}
