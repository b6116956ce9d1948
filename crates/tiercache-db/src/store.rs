//! SQLite-backed cache store

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tiercache_storage::{CacheStore, Entry};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::models::CacheRow;

/// Table-per-database cache store
///
/// Entries are rows of the `cache` table, keyed by `key`. The database file
/// and its parent directory are created on first use, over a single
/// connection.
pub struct TableStore {
    path: PathBuf,
    pool: OnceCell<Option<SqlitePool>>,
}

impl TableStore {
    /// Create a table store backed by the database file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the connection pool, opening it on first use
    ///
    /// A failed open is remembered; every later call reports the store as
    /// unavailable.
    async fn pool(&self) -> Result<&SqlitePool, DbError> {
        self.pool
            .get_or_init(|| async {
                match self.connect().await {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        warn!("Failed to open database {:?}: {}", self.path, e);
                        None
                    }
                }
            })
            .await
            .as_ref()
            .ok_or_else(|| DbError::Unavailable(format!("{:?}", self.path)))
    }

    async fn connect(&self) -> Result<SqlitePool, DbError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        info!("Connecting to database: {:?}", self.path);

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        Ok(pool)
    }

    /// Insert an entry or replace the row with the same key
    pub async fn try_put(&self, entry: &Entry) -> Result<(), DbError> {
        check_key(&entry.key)?;
        let pool = self.pool().await?;
        debug!("Storing row {:?} ({} bytes)", entry.key, entry.size());

        sqlx::query(
            r#"
            INSERT INTO cache (key, data, overdue)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET data = excluded.data, overdue = excluded.overdue
            "#,
        )
        .bind(&entry.key)
        .bind(entry.payload.as_ref())
        .bind(entry.deadline.as_secs())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the row for `key`, latest deadline first
    pub async fn try_get(&self, key: &str) -> Result<Option<Entry>, DbError> {
        check_key(key)?;
        let pool = self.pool().await?;
        debug!("Querying row {:?}", key);

        let row = sqlx::query(
            r#"
            SELECT key, data, overdue
            FROM cache
            WHERE key = ?
            ORDER BY overdue DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(pool)
        .await?;

        row.map(|row| CacheRow::try_from(&row).map(Entry::from).map_err(DbError::from))
            .transpose()
    }

    /// Delete the row for `key`, `Ok(false)` if there was none
    pub async fn try_delete(&self, key: &str) -> Result<bool, DbError> {
        check_key(key)?;
        let pool = self.pool().await?;
        debug!("Deleting row {:?}", key);

        let result = sqlx::query("DELETE FROM cache WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every row, returns the number of rows removed
    pub async fn try_clear(&self) -> Result<u64, DbError> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM cache").execute(pool).await?;

        info!("Cleared {} rows from table store", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Size of the database file, 0 if it has not been created yet
    pub async fn try_cost_size(&self) -> Result<u64, DbError> {
        match fs::metadata(&self.path).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(DbError::Io(e)),
        }
    }

    /// Number of rows in the table
    pub async fn count(&self) -> Result<i64, DbError> {
        let pool = self.pool().await?;
        let result = sqlx::query("SELECT COUNT(*) as count FROM cache")
            .fetch_one(pool)
            .await?;
        Ok(result.get("count"))
    }
}

fn check_key(key: &str) -> Result<(), DbError> {
    if key.is_empty() {
        return Err(DbError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Create the cache table if it doesn't exist
async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    info!("Running database migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache (
            key TEXT PRIMARY KEY NOT NULL,
            data BLOB NOT NULL,
            overdue REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl CacheStore for TableStore {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn put(&self, entry: &Entry) -> bool {
        match self.try_put(entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Table store insert failed for {:?}: {}", entry.key, e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<Entry> {
        match self.try_get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Table store query failed for {:?}: {}", key, e);
                None
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self.try_delete(key).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("Table store delete failed for {:?}: {}", key, e);
                false
            }
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!("Table store clear failed: {}", e);
        }
    }

    async fn cost_size(&self) -> u64 {
        match self.try_cost_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!("Table store cost size failed: {}", e);
                0
            }
        }
    }
}
