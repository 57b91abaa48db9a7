//! SQLite pool and the [`Database`] handle shared by every service.
//!
//! ```text
//! DATABASE_URL ─► DbConfig ─► Database::new ─► SqlitePool (WAL, FKs on)
//!                                   │
//!                                   └─► db.begin() ─► UnitOfWork
//! ```
//!
//! Write transactions open with `BEGIN IMMEDIATE`, so the database write lock
//! is held before the first read. A second writer queues for up to
//! `busy_timeout` and then sees everything the first committed. The
//! `UPDATE t SET id = id` row locks in the repositories mark which rows a
//! transaction is about to change. Readers use [`Database::begin_read`] and
//! never wait.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::unit_of_work::UnitOfWork;

const MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Pool settings. Built with [`DbConfig::new`] and chained setters:
///
/// ```rust,ignore
/// let config = DbConfig::new("sqlite://storefront.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// File path with any `sqlite:` scheme removed.
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `begin()` waits for a free connection.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a writer waits on SQLite's write lock. A checkout holds
    /// that lock across its gateway call, so this should exceed the gateway
    /// timeout.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// Accepts a bare path or a `sqlite://` / `sqlite:` URL.
    pub fn new(location: impl AsRef<Path>) -> Self {
        Self {
            database_path: strip_scheme(location.as_ref()),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Fresh migrated database per call. Pinned to one connection because
    /// each `:memory:` connection opens a separate, empty database.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(1),
            ..Self::new(MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

fn strip_scheme(location: &Path) -> PathBuf {
    let raw = location.to_string_lossy();
    match raw.strip_prefix("sqlite://").or_else(|| raw.strip_prefix("sqlite:")) {
        Some(rest) => PathBuf::from(rest),
        None => location.to_path_buf(),
    }
}

// =============================================================================
// Database
// =============================================================================

/// Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening storefront database");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            // recycling an in-memory connection would discard the schema
            .max_lifetime(None)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Self { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Brings the schema up to date; a no-op when nothing is pending.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts a write transaction. An uncommitted [`UnitOfWork`] rolls back
    /// on drop.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front. A deferred `BEGIN`
    /// that reads first and writes later cannot be upgraded while another
    /// writer is active: SQLite returns `SQLITE_BUSY` at once without
    /// consulting `busy_timeout`.
    pub async fn begin(&self) -> DbResult<UnitOfWork> {
        self.start("BEGIN IMMEDIATE").await
    }

    /// Starts a read-only transaction that never blocks writers.
    pub async fn begin_read(&self) -> DbResult<UnitOfWork> {
        self.start("BEGIN").await
    }

    async fn start(&self, statement: &'static str) -> DbResult<UnitOfWork> {
        match self.pool.begin_with(statement).await {
            Ok(tx) => Ok(UnitOfWork::new(tx)),
            Err(e) => Err(DbError::TransactionFailed(e.to_string())),
        }
    }

    pub async fn close(&self) {
        info!("Closing storefront database");
        self.pool.close().await;
    }

    /// Used by `GET /health`.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|one| one == 1)
            .unwrap_or(false)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let (embedded, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert!(embedded > 0);
        assert_eq!(embedded, applied);

        // running again applies nothing new
        db.run_migrations().await.unwrap();
        assert_eq!(migrations::migration_status(db.pool()).await.unwrap().1, applied);
    }

    #[test]
    fn test_setters_override_defaults() {
        let config = DbConfig::new("/var/lib/storefront/shop.db")
            .max_connections(10)
            .min_connections(2)
            .connect_timeout(Duration::from_secs(3))
            .busy_timeout(Duration::from_secs(9))
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.busy_timeout, Duration::from_secs(9));
        assert!(!config.run_migrations);
        assert!(!config.is_memory());
        assert!(DbConfig::in_memory().is_memory());
    }

    #[test]
    fn test_database_url_scheme_removed() {
        for (input, expected) in [
            ("sqlite://data/storefront.db", "data/storefront.db"),
            ("sqlite:storefront.db", "storefront.db"),
            ("storefront.db", "storefront.db"),
        ] {
            assert_eq!(DbConfig::new(input).database_path, PathBuf::from(expected));
        }
    }

    async fn insert_user(uow: &mut UnitOfWork, id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO users (id, first_name, email, created_at) VALUES (?, 'A', ?, '2025-01-01T00:00:00Z')",
        )
        .bind(id)
        .bind(format!("{id}@x"))
        .execute(uow.conn())
        .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_write_transactions_queue_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("queue.db")).max_connections(3))
            .await
            .unwrap();

        let mut first = db.begin().await.unwrap();
        insert_user(&mut first, "a").await.unwrap();

        let second = tokio::spawn({
            let db = db.clone();
            async move {
                let mut uow = db.begin().await?;
                // read before write, the shape of every cart operation
                let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(uow.conn())
                    .await?;
                insert_user(&mut uow, "b").await?;
                uow.commit().await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!second.is_finished());

        // readers are not held up by the open writer
        let mut reader = db.begin_read().await.unwrap();
        let seen: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(reader.conn())
            .await
            .unwrap();
        assert_eq!(seen, 0);
        reader.rollback().await.unwrap();

        first.commit().await.unwrap();
        second.await.unwrap().unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_uncommitted_unit_of_work_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut uow = db.begin().await.unwrap();
            sqlx::query(
                "INSERT INTO users (id, first_name, email, created_at) VALUES ('u', 'A', 'a@x', '2025-01-01T00:00:00Z')",
            )
            .execute(uow.conn())
            .await
            .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
