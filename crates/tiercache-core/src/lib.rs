//! Tiercache Core
//!
//! This crate provides the cache manager: routing between the table store
//! and the file store, the serial work queue behind the queued API, and the
//! blocking front end.

pub mod blocking;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;

pub use blocking::BlockingCacheManager;
pub use cache::{Backend, CacheManager, CallbackDispatcher, CallbackQueue, Pending};
pub use config::{CacheConfig, LoggingConfig};
pub use error::CoreError;
pub use logging::init_logging;
pub use tiercache_storage::{Deadline, Entry};
