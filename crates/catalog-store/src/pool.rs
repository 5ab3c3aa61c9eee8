//! Fixed-size SQLite connection pool.
//!
//! Connections are handed out as [`PooledConnection`] guards that put the
//! connection back when dropped, whether the caller returns normally, bails
//! out with `?`, or unwinds.

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// A fixed set of open connections shared between threads.
pub struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    returned: Condvar,
    size: usize,
}

impl ConnectionPool {
    /// Opens `size` connections with `open` and pools them.
    pub fn new<F>(size: usize, mut open: F) -> StoreResult<Self>
    where
        F: FnMut() -> rusqlite::Result<Connection>,
    {
        let size = size.max(1);
        let connections = (0..size)
            .map(|_| open())
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(size, "connection pool opened");
        Ok(Self {
            idle: Mutex::new(connections),
            returned: Condvar::new(),
            size,
        })
    }

    /// Takes a connection, waiting at most `timeout` for one to come back.
    pub fn acquire(&self, timeout: Duration) -> StoreResult<PooledConnection<'_>> {
        let deadline = Instant::now() + timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if self.returned.wait_until(&mut idle, deadline).timed_out() && idle.is_empty() {
                warn!(?timeout, size = self.size, "connection pool exhausted");
                return Err(StoreError::PoolExhausted(timeout));
            }
        }
    }

    /// Total number of connections owned by the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently idle.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn give_back(&self, conn: Connection) {
        self.idle.lock().push(conn);
        self.returned.notify_one();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size)
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// A connection borrowed from a [`ConnectionPool`].
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
