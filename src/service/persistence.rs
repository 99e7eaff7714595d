//! Persistent Store Module
//!
//! Relational store capability used by business logic and health checks.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::error::StoreError;

/// Relational store capability.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Runs a single-value read and returns its integer result.
    async fn query(&self, statement: &str) -> Result<i64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

// == SQLite Store ==
/// [`PersistentStore`] over a single SQLite connection.
///
/// rusqlite is blocking, so every call runs on the blocking pool while
/// holding the connection mutex.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&*conn).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn query(&self, statement: &str) -> Result<i64, StoreError> {
        let statement = statement.to_string();
        self.with_conn(move |conn| conn.query_row(&statement, [], |row| row.get(0)))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }
}
