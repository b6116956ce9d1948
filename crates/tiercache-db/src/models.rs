//! Database row models

use bytes::Bytes;
use sqlx::Row;
use tiercache_storage::{Deadline, Entry};

/// A row of the `cache` table
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub key: String,
    pub data: Vec<u8>,
    pub overdue: f64,
}

impl From<CacheRow> for Entry {
    fn from(row: CacheRow) -> Self {
        Entry {
            key: row.key,
            payload: Bytes::from(row.data),
            deadline: Deadline::from_secs(row.overdue),
        }
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for CacheRow {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(CacheRow {
            key: row.try_get("key")?,
            data: row.try_get("data")?,
            overdue: row.try_get("overdue")?,
        })
    }
}
