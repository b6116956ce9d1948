//! Routing between the table store and the file store

use bytes::Bytes;
use std::sync::Arc;
use tiercache_storage::{CacheStore, Deadline, Entry};
use tracing::debug;

use super::backend::Backend;

/// Owns both stores and decides which one serves an operation
pub(crate) struct TierRouter {
    table: Arc<dyn CacheStore>,
    file: Arc<dyn CacheStore>,
    size_threshold: usize,
}

impl TierRouter {
    pub(crate) fn new(
        table: Arc<dyn CacheStore>,
        file: Arc<dyn CacheStore>,
        size_threshold: usize,
    ) -> Self {
        Self {
            table,
            file,
            size_threshold,
        }
    }

    pub(crate) fn size_threshold(&self) -> usize {
        self.size_threshold
    }

    /// Store picked for a write of `len` bytes
    fn write_target(&self, len: usize, backend: Backend) -> &dyn CacheStore {
        match backend {
            Backend::File => &*self.file,
            Backend::Table => &*self.table,
            Backend::Auto if len > self.size_threshold => &*self.file,
            Backend::Auto => &*self.table,
        }
    }

    /// Look up an entry; `Auto` checks the file store before the table store
    pub(crate) async fn fetch(&self, key: &str, backend: Backend) -> Option<Entry> {
        match backend {
            Backend::File => self.file.get(key).await,
            Backend::Table => self.table.get(key).await,
            Backend::Auto => match self.file.get(key).await {
                Some(entry) => Some(entry),
                None => self.table.get(key).await,
            },
        }
    }

    /// Store a payload, or remove the key when there is none
    pub(crate) async fn store(
        &self,
        payload: Option<Bytes>,
        key: &str,
        backend: Backend,
        deadline: Deadline,
    ) -> bool {
        let Some(payload) = payload else {
            return self.remove(key, backend).await;
        };

        let target = self.write_target(payload.len(), backend);
        debug!(
            "Routing {} ({} bytes, {}) to {} store",
            key,
            payload.len(),
            backend,
            target.name()
        );

        target.put(&Entry::new(key, payload, deadline)).await
    }

    /// Remove a key; `Auto` tries both stores and succeeds if either held it
    pub(crate) async fn remove(&self, key: &str, backend: Backend) -> bool {
        match backend {
            Backend::File => self.file.delete(key).await,
            Backend::Table => self.table.delete(key).await,
            Backend::Auto => {
                let from_table = self.table.delete(key).await;
                let from_file = self.file.delete(key).await;
                from_table || from_file
            }
        }
    }

    pub(crate) async fn clear(&self, backend: Backend) {
        match backend {
            Backend::File => self.file.clear().await,
            Backend::Table => self.table.clear().await,
            Backend::Auto => {
                self.table.clear().await;
                self.file.clear().await;
            }
        }
    }

    pub(crate) async fn disk_cost(&self) -> u64 {
        self.file.cost_size().await
    }

    pub(crate) async fn database_cost(&self) -> u64 {
        self.table.cost_size().await
    }
}
