//! Database manager implementation
//!
//! This module provides database connection management with:
//! - SQLite connection pool using r2d2
//! - Connection-string parsing (the `connect_to_db` helper)
//! - Async wrappers that run blocking work off the runtime
//! - Unit-of-work and plain transaction support

use crate::core::error::{DrinkError, Result};
use crate::db::migrations;
use crate::db::session::Session;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Parse a connection string
    ///
    /// Accepted forms: `sqlite::memory:`, `:memory:`, `sqlite://relative/path.db`,
    /// `sqlite:///absolute/path.db` and a bare file path.
    pub fn parse(db_uri: &str) -> Result<Self> {
        let uri = db_uri.trim();
        if uri.is_empty() {
            return Err(DrinkError::InvalidRequest(
                "database connection string is empty".to_string(),
            ));
        }

        if uri == ":memory:" || uri == "sqlite::memory:" || uri == "sqlite://:memory:" {
            return Ok(DatabaseLocation::Memory);
        }

        if let Some(path) = uri.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(DrinkError::InvalidRequest(format!(
                    "missing database path in '{}'",
                    db_uri
                )));
            }
            return Ok(DatabaseLocation::File(PathBuf::from(path)));
        }

        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(DrinkError::InvalidRequest(format!(
                "unsupported database scheme '{}'",
                scheme
            )));
        }

        Ok(DatabaseLocation::File(PathBuf::from(uri)))
    }
}

/// Database manager with connection pool
pub struct DatabaseManager {
    pool: Pool<SqliteConnectionManager>,
    location: DatabaseLocation,
}

impl DatabaseManager {
    /// Connect to the database named by a connection string and make sure
    /// the schema exists
    pub fn connect(db_uri: &str, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        match DatabaseLocation::parse(db_uri)? {
            DatabaseLocation::Memory => Self::new_in_memory(),
            DatabaseLocation::File(path) => Self::new(&path, pool_size, busy_timeout),
        }
    }

    /// Create a new DatabaseManager with the specified database path and pool size
    pub fn new(db_path: &Path, pool_size: u32, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)?;

        let manager = Self {
            pool,
            location: DatabaseLocation::File(db_path.to_path_buf()),
        };

        manager.migrate()?;
        info!(path = %db_path.display(), pool_size, "Database ready");

        Ok(manager)
    }

    /// Create a new DatabaseManager with an in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        // Every in-memory connection is its own database, so the pool holds
        // exactly one and never reaps it
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)?;

        let manager = Self {
            pool,
            location: DatabaseLocation::Memory,
        };

        manager.migrate()?;
        debug!("In-memory database ready");

        Ok(manager)
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Execute a database operation asynchronously
    ///
    /// This wraps synchronous database operations in tokio::task::spawn_blocking
    /// to avoid blocking the async runtime.
    pub async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| DrinkError::TaskError(format!("Database task panicked: {}", e)))?
    }

    /// Execute a database operation within a transaction
    ///
    /// The transaction is committed if the closure returns Ok and rolled back
    /// if it returns Err.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .map_err(|e| DrinkError::TaskError(format!("Transaction task panicked: {}", e)))?
    }

    /// Run a unit of work on a blocking thread
    ///
    /// The closure registers changes on the [`Session`]; whatever it left
    /// pending is committed once it returns Ok. On Err every pending change
    /// is discarded. The closure may commit on its own to read assigned ids
    /// before returning.
    pub async fn unit_of_work<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let mut session = Session::new(&mut conn);
            let outcome = f(&mut session);
            match outcome {
                Ok(value) => {
                    session.commit()?;
                    Ok(value)
                }
                Err(e) => {
                    session.rollback();
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| DrinkError::TaskError(format!("Unit of work panicked: {}", e)))?
    }

    /// Create any missing tables
    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        migrations::create_all(&mut conn)
    }

    /// Drop every table and create the schema again
    pub fn reset(&self) -> Result<()> {
        let mut conn = self.get_connection()?;
        migrations::drop_all(&mut conn)?;
        migrations::create_all(&mut conn)
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Get the current pool size
    pub fn pool_size(&self) -> u32 {
        self.pool.max_size()
    }
}

impl Clone for DatabaseManager {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            location: self.location.clone(),
        }
    }
}
