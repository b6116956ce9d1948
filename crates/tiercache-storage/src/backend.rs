//! Cache store trait

use async_trait::async_trait;

use crate::entry::Entry;
use crate::error::StoreError;

/// Uniform contract shared by every cache backend
///
/// Implementations absorb their own I/O failures: a failed operation is
/// logged and reported as `false`, `None` or `0`, never as an error.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Insert or fully replace the entry stored under `entry.key`
    async fn put(&self, entry: &Entry) -> bool;

    /// Look up an entry regardless of its deadline
    async fn get(&self, key: &str) -> Option<Entry>;

    /// Delete an entry, `false` if nothing was deleted
    async fn delete(&self, key: &str) -> bool;

    /// Remove every entry
    async fn clear(&self);

    /// Bytes the backend currently occupies on disk
    async fn cost_size(&self) -> u64;
}

/// Check that a key can be used verbatim as a file name
pub fn validate_file_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);

    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
