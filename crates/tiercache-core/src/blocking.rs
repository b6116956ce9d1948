//! Thread-blocking front end for the cache manager

use bytes::Bytes;
use tiercache_storage::Deadline;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::cache::{Backend, CacheManager, Pending};
use crate::config::CacheConfig;
use crate::error::CoreError;

/// Cache manager with blocking methods, for callers without an async runtime
///
/// Owns a small runtime that hosts the work queue and the callback
/// dispatcher. Methods must not be called from inside an async context.
pub struct BlockingCacheManager {
    manager: CacheManager,
    runtime: Runtime,
}

impl BlockingCacheManager {
    /// Start the runtime and open the stores described by `config`
    pub fn open(config: &CacheConfig) -> Result<Self, CoreError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("tiercache-worker")
            .enable_all()
            .build()?;

        let manager = {
            let _guard = runtime.enter();
            CacheManager::open(config)?
        };

        info!("Started blocking cache manager");
        Ok(Self { manager, runtime })
    }

    /// Underlying manager, for the queued API
    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    /// Block until a queued request completes
    pub fn wait<T: Default>(&self, pending: Pending<T>) -> T {
        self.runtime.block_on(pending)
    }

    pub fn get(&self, key: &str, backend: Backend) -> Option<Bytes> {
        self.runtime.block_on(self.manager.get(key, backend))
    }

    pub fn set(
        &self,
        payload: Option<Bytes>,
        key: &str,
        backend: Backend,
        deadline: Deadline,
    ) -> bool {
        self.runtime
            .block_on(self.manager.set(payload, key, backend, deadline))
    }

    pub fn remove(&self, key: &str, backend: Backend) -> bool {
        self.runtime.block_on(self.manager.remove(key, backend))
    }

    pub fn clear(&self, backend: Backend) {
        self.runtime.block_on(self.manager.clear(backend))
    }

    pub fn disk_cost(&self) -> u64 {
        self.runtime.block_on(self.manager.disk_cost())
    }

    pub fn database_cost(&self) -> u64 {
        self.runtime.block_on(self.manager.database_cost())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open() -> (TempDir, BlockingCacheManager) {
        let dir = TempDir::new().unwrap();
        let cache = BlockingCacheManager::open(&CacheConfig::with_base_dir(dir.path())).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_blocking_roundtrip_and_routing() {
        let (_dir, cache) = open();

        let small = Bytes::from(vec![1u8; 1000]);
        let large = Bytes::from(vec![2u8; 2000]);
        assert!(cache.set(Some(small.clone()), "small", Backend::Auto, Deadline::NEVER));
        assert!(cache.set(Some(large.clone()), "large", Backend::Auto, Deadline::NEVER));

        assert_eq!(cache.get("small", Backend::Table), Some(small));
        assert_eq!(cache.get("large", Backend::File), Some(large));
        assert!(cache.disk_cost() > 2000);
        assert!(cache.database_cost() > 0);

        assert!(cache.remove("small", Backend::Auto));
        cache.clear(Backend::Auto);
        assert_eq!(cache.get("large", Backend::Auto), None);
    }

    #[test]
    fn test_wait_on_queued_request() {
        let (_dir, cache) = open();

        let first = cache
            .manager()
            .set_request(Some(Bytes::from_static(b"p1")), "k", Backend::Auto, Deadline::NEVER);
        let second = cache
            .manager()
            .set_request(Some(Bytes::from_static(b"p2")), "k", Backend::Auto, Deadline::NEVER);

        assert!(cache.wait(second));
        assert!(cache.wait(first));
        assert_eq!(cache.get("k", Backend::Auto), Some(Bytes::from_static(b"p2")));
    }

    #[test]
    fn test_callback_runs_without_caller_runtime() {
        let (_dir, cache) = open();
        let (tx, rx) = mpsc::channel();

        cache.manager().set_then(
            Some(Bytes::from_static(b"v")),
            "k",
            Backend::Table,
            Deadline::NEVER,
            move |ok| tx.send(ok).unwrap(),
        );

        assert!(rx.recv_timeout(Duration::from_secs(10)).unwrap());
        assert_eq!(cache.get("k", Backend::Table), Some(Bytes::from_static(b"v")));
    }
}
