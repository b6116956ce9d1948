//! Cache manager implementation

use bytes::Bytes;
use std::sync::Arc;
use tiercache_db::TableStore;
use tiercache_storage::{CacheStore, Deadline, Entry, FileStore};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::Backend;
use super::callback::CallbackQueue;
use super::queue::{Pending, Reply, Request, run_worker};
use super::router::TierRouter;
use crate::config::CacheConfig;
use crate::error::CoreError;

/// Tiered cache over a table store and a file store
///
/// Two ways to use it:
///
/// - Direct calls (`get`, `set`, `remove`, `clear`) run on the caller's task.
///   They take no lock, so concurrent direct calls on the same key are not
///   ordered against each other.
/// - Queued calls (`*_request`, `*_then`) go through a single serial work
///   queue. They run one at a time in submission order, and their results are
///   delivered in that order on the callback queue. There is no cancellation
///   and no timeout: a stuck store stalls every later queued call.
///
/// Entry deadlines are stored but never enforced.
pub struct CacheManager {
    router: Arc<TierRouter>,
    requests: mpsc::UnboundedSender<Request>,
}

impl CacheManager {
    /// Open the stores described by `config`, delivering results on a
    /// dedicated callback task
    pub fn open(config: &CacheConfig) -> Result<Self, CoreError> {
        Self::with_callbacks(config, CallbackQueue::spawn()?)
    }

    /// Open the stores described by `config` with a caller-provided callback queue
    pub fn with_callbacks(
        config: &CacheConfig,
        callbacks: CallbackQueue,
    ) -> Result<Self, CoreError> {
        info!(
            "Opening cache stores (table: {:?}, files: {:?})",
            config.table_path, config.file_dir
        );

        let table = Arc::new(TableStore::new(&config.table_path));
        let file = Arc::new(FileStore::new(&config.file_dir));
        Self::new(table, file, config.size_threshold, callbacks)
    }

    /// Create a cache manager over arbitrary stores
    ///
    /// Spawns the work queue on the current Tokio runtime.
    pub fn new(
        table: Arc<dyn CacheStore>,
        file: Arc<dyn CacheStore>,
        size_threshold: usize,
        callbacks: CallbackQueue,
    ) -> Result<Self, CoreError> {
        let handle = tokio::runtime::Handle::try_current()?;

        info!(
            "Initializing cache manager (size_threshold: {} bytes)",
            size_threshold
        );

        let router = Arc::new(TierRouter::new(table, file, size_threshold));
        let (requests, rx) = mpsc::unbounded_channel();
        handle.spawn(run_worker(router.clone(), rx, callbacks));

        Ok(Self { router, requests })
    }

    pub fn size_threshold(&self) -> usize {
        self.router.size_threshold()
    }

    // ==================== Direct Operations ====================

    /// Get the payload stored under `key`
    pub async fn get(&self, key: &str, backend: Backend) -> Option<Bytes> {
        self.fetch(key, backend).await.map(|entry| entry.payload)
    }

    /// Get the full entry stored under `key`
    pub async fn fetch(&self, key: &str, backend: Backend) -> Option<Entry> {
        self.router.fetch(key, backend).await
    }

    /// Store `payload` under `key`; `None` removes the key instead
    pub async fn set(
        &self,
        payload: Option<Bytes>,
        key: &str,
        backend: Backend,
        deadline: Deadline,
    ) -> bool {
        self.router.store(payload, key, backend, deadline).await
    }

    /// Remove `key`, `true` if any selected store held it
    pub async fn remove(&self, key: &str, backend: Backend) -> bool {
        self.router.remove(key, backend).await
    }

    /// Remove every entry from the selected stores
    pub async fn clear(&self, backend: Backend) {
        self.router.clear(backend).await
    }

    /// Bytes used by the file store
    pub async fn disk_cost(&self) -> u64 {
        self.router.disk_cost().await
    }

    /// Bytes used by the table store
    pub async fn database_cost(&self) -> u64 {
        self.router.database_cost().await
    }

    // ==================== Queued Operations ====================

    fn submit(&self, request: Request) {
        if self.requests.send(request).is_err() {
            warn!("Cache worker stopped, dropping request");
        }
    }

    /// Queued [`get`](Self::get)
    pub fn get_request(&self, key: impl Into<String>, backend: Backend) -> Pending<Option<Bytes>> {
        let (pending, reply) = Pending::new();
        let reply: Reply<Option<Entry>> = Box::new(move |entry| reply(entry.map(|e| e.payload)));
        self.submit_fetch(key.into(), backend, reply);
        pending
    }

    /// Queued [`fetch`](Self::fetch)
    pub fn fetch_request(
        &self,
        key: impl Into<String>,
        backend: Backend,
    ) -> Pending<Option<Entry>> {
        let (pending, reply) = Pending::new();
        self.submit_fetch(key.into(), backend, reply);
        pending
    }

    /// Queued [`set`](Self::set)
    pub fn set_request(
        &self,
        payload: Option<Bytes>,
        key: impl Into<String>,
        backend: Backend,
        deadline: Deadline,
    ) -> Pending<bool> {
        let (pending, reply) = Pending::new();
        self.submit_store(payload, key.into(), backend, deadline, reply);
        pending
    }

    /// Queued [`remove`](Self::remove)
    pub fn remove_request(&self, key: impl Into<String>, backend: Backend) -> Pending<bool> {
        let (pending, reply) = Pending::new();
        self.submit(Request::Remove {
            key: key.into(),
            backend,
            reply,
        });
        pending
    }

    /// Queued [`clear`](Self::clear)
    pub fn clear_request(&self, backend: Backend) -> Pending<()> {
        let (pending, reply) = Pending::new();
        self.submit(Request::Clear { backend, reply });
        pending
    }

    /// Queued [`get`](Self::get), result passed to `callback` on the callback queue
    pub fn get_then<F>(&self, key: impl Into<String>, backend: Backend, callback: F)
    where
        F: FnOnce(Option<Bytes>) + Send + 'static,
    {
        let reply: Reply<Option<Entry>> =
            Box::new(move |entry| callback(entry.map(|e| e.payload)));
        self.submit_fetch(key.into(), backend, reply);
    }

    /// Queued [`set`](Self::set), result passed to `callback` on the callback queue
    pub fn set_then<F>(
        &self,
        payload: Option<Bytes>,
        key: impl Into<String>,
        backend: Backend,
        deadline: Deadline,
        callback: F,
    ) where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit_store(payload, key.into(), backend, deadline, Box::new(callback));
    }

    /// Queued [`remove`](Self::remove), result passed to `callback` on the callback queue
    pub fn remove_then<F>(&self, key: impl Into<String>, backend: Backend, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.submit(Request::Remove {
            key: key.into(),
            backend,
            reply: Box::new(callback),
        });
    }

    /// Queued [`clear`](Self::clear), `callback` runs on the callback queue when done
    pub fn clear_then<F>(&self, backend: Backend, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Request::Clear {
            backend,
            reply: Box::new(move |()| callback()),
        });
    }

    fn submit_fetch(&self, key: String, backend: Backend, reply: Reply<Option<Entry>>) {
        self.submit(Request::Fetch {
            key,
            backend,
            reply,
        });
    }

    fn submit_store(
        &self,
        payload: Option<Bytes>,
        key: String,
        backend: Backend,
        deadline: Deadline,
        reply: Reply<bool>,
    ) {
        self.submit(Request::Store {
            payload,
            key,
            backend,
            deadline,
            reply,
        });
    }
}
