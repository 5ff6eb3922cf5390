//! # Database Pool Management
//!
//! Connection pool creation and configuration for SQLite.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Server Startup                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       │ Reads run concurrently on any connection (WAL mode).           │
//! │       │ Write transactions additionally hold the writer mutex:         │
//! │       │ SQLite allows one writer at a time, and taking the mutex       │
//! │       │ up front means a deferred transaction never observes a         │
//! │       │ concurrent commit mid-flight (no stale-snapshot failures,      │
//! │       │ no busy-handler retry loops).                                  │
//! │       ▼                                                                 │
//! │  begin_write() ──► writer mutex + BEGIN ──► statements ──► COMMIT      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block writers
//! - Writers don't block readers
//! - Better crash recovery

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::locks::EntityLocks;
use crate::migrations;
use crate::repository::archive::ArchiveRepository;
use crate::repository::billing::BillingRepository;
use crate::repository::queue::QueueRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/pila/pila.db")
///     .max_connections(5)
///     .lock_timeout(Duration::from_millis(2000));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5 (sufficient for one service location)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Bounded wait for entity locks before a mutation fails with `Busy`.
    /// Default: 2 seconds
    pub lock_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(2),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the entity lock acquire timeout.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let config = DbConfig::in_memory();
    /// let db = Database::new(config).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            lock_timeout: Duration::from_millis(500),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Write Transaction
// =============================================================================

/// A write transaction holding the process-wide writer mutex.
///
/// SQLite permits a single writer; every multi-statement mutation goes
/// through here so a write transaction sees a stable snapshot from its
/// first statement to COMMIT. Dropping a `WriteTx` without committing
/// rolls the transaction back (sqlx's managed rollback-on-drop).
pub struct WriteTx {
    _writer: OwnedMutexGuard<()>,
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl WriteTx {
    /// The executor to run statements against.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Consumes the wrapper, releasing the writer mutex after an explicit
    /// rollback (dropping has the same effect via sqlx, this just makes
    /// intent visible at call sites).
    pub async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    /// Commits the transaction and releases the writer mutex.
    pub async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// ## Design: One Handle, Many Repositories
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Database                                                               │
/// │  ├── queue()    → QueueRepository     (queue entries + token counter)  │
/// │  ├── billing()  → BillingRepository   (transactions + settlements)     │
/// │  ├── archive()  → ArchiveRepository   (reset lock, archives, log)      │
/// │  └── locks()    → EntityLocks         (per-entity serialization)       │
/// │                                                                         │
/// │  Repositories are cheap clones around the shared pool; the caller      │
/// │  composes them with locks() to build the serialized write path.        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    /// Per-entity lock registry (bounded acquire → `Busy`).
    locks: Arc<EntityLocks>,

    /// Process-wide writer mutex (see [`WriteTx`]).
    writer: Arc<Mutex<()>>,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite for this workload:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            // WAL mode: Better concurrent read performance
            // Readers don't block writers, writers don't block readers
            .journal_mode(SqliteJournalMode::Wal)
            // NORMAL synchronous: Good balance of durability and speed
            // Data is safe from corruption, may lose last transaction on crash
            .synchronous(SqliteSynchronous::Normal)
            // Enable foreign key constraints
            // SQLite has them disabled by default for backwards compatibility
            .foreign_keys(true)
            // Wait briefly for SQLite-level locks instead of failing outright
            .busy_timeout(Duration::from_secs(5))
            // Create file if it doesn't exist
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            locks: Arc::new(EntityLocks::new(config.lock_timeout)),
            writer: Arc::new(Mutex::new(())),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// ## What This Does
    /// - Applies all pending migrations in order
    /// - Tracks applied migrations in `_sqlx_migrations` table
    /// - Idempotent: safe to run multiple times
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    ///
    /// ## Usage
    /// For read queries and advanced cases not covered by repositories.
    /// Prefer repository methods when available.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the entity lock registry.
    ///
    /// Callers hold the relevant entity lock around a mutation + its
    /// realtime publish; that pairing is what gives observers per-entity
    /// commit order.
    pub fn locks(&self) -> &Arc<EntityLocks> {
        &self.locks
    }

    /// Begins a write transaction behind the process-wide writer mutex.
    pub(crate) async fn begin_write(&self) -> DbResult<WriteTx> {
        let writer = self.writer.clone().lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(WriteTx { _writer: writer, tx })
    }

    /// Returns the queue repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let waiting = db.queue().list_active().await?;
    /// ```
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.clone())
    }

    /// Returns the billing repository.
    pub fn billing(&self) -> BillingRepository {
        BillingRepository::new(self.clone())
    }

    /// Returns the archive/reset repository.
    pub fn archive(&self) -> ArchiveRepository {
        ArchiveRepository::new(self.clone())
    }

    /// Closes the database connection pool.
    ///
    /// ## When To Call
    /// - On application shutdown
    ///
    /// ## Note
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .lock_timeout(Duration::from_millis(100));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.lock_timeout, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_write_tx_commit_and_rollback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        // Committed write persists
        let mut wtx = db.begin_write().await.unwrap();
        sqlx::query("UPDATE token_counters SET next_token = 42 WHERE id = 1")
            .execute(wtx.conn())
            .await
            .unwrap();
        wtx.commit().await.unwrap();

        // Dropped write rolls back
        let mut wtx = db.begin_write().await.unwrap();
        sqlx::query("UPDATE token_counters SET next_token = 99 WHERE id = 1")
            .execute(wtx.conn())
            .await
            .unwrap();
        drop(wtx);

        let next: i64 = sqlx::query_scalar("SELECT next_token FROM token_counters WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(next, 42);
    }
}
