//! Connection pooling for the warehouse file.
//!
//! Every connection handed out is a clone of one root handle, so the process
//! holds a single `DuckDB` instance per file and concurrent evaluators see
//! each other's committed rows.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::Connection;

struct PoolState {
    root: Connection,
    idle: Vec<Connection>,
}

struct Shared {
    db_path: PathBuf,
    max_idle: usize,
    state: Mutex<PoolState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        // the state is a plain Vec and a handle; a panic elsewhere cannot
        // leave it half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pool of `DuckDB` connections sharing one database instance.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

impl ConnectionPool {
    /// Open (or create) the database file. At most `max_idle` connections
    /// are parked between checkouts; more may be open at once.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(&db_path)?;
        prepare(&root)?;

        Ok(Self {
            shared: Arc::new(Shared {
                db_path,
                max_idle: max_idle.max(1),
                state: Mutex::new(PoolState {
                    root,
                    idle: Vec::new(),
                }),
            }),
        })
    }

    /// Reuse a parked connection or clone a new one from the root handle.
    pub fn checkout(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let connection = {
            let mut state = self.shared.state();
            match state.idle.pop() {
                Some(connection) => connection,
                None => {
                    let connection = state.root.try_clone()?;
                    prepare(&connection)?;
                    connection
                }
            }
        };

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.state().idle.len()
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }
}

/// Checked-out connection; parked again on drop while the pool has room.
pub struct PooledConnection {
    shared: Arc<Shared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .expect("connection is only taken in drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .expect("connection is only taken in drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let mut state = self.shared.state();
            if state.idle.len() < self.shared.max_idle {
                state.idle.push(connection);
            }
        }
    }
}

fn prepare(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parks_at_most_max_idle_connections() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::open(temp.path().join("pool.duckdb"), 1).expect("open");

        let first = pool.checkout().expect("first");
        let second = pool.checkout().expect("second");
        drop(first);
        drop(second);

        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn checked_out_connections_share_the_database() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::open(temp.path().join("pool.duckdb"), 2).expect("open");

        let writer = pool.checkout().expect("writer");
        writer
            .execute_batch("CREATE TABLE marker (forecast_id BIGINT); INSERT INTO marker VALUES (7);")
            .expect("write");

        let reader = pool.checkout().expect("reader");
        let id: i64 = reader
            .query_row("SELECT forecast_id FROM marker", [], |row| row.get(0))
            .expect("read");
        assert_eq!(id, 7);
    }
}
