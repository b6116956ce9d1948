//! Tiercache Storage Layer
//!
//! This crate provides the entry model, the envelope codec, the
//! `CacheStore` contract shared by all backends, and the flat-file store.

pub mod backend;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod file;

pub use backend::CacheStore;
pub use entry::{Deadline, Entry};
pub use envelope::EnvelopeError;
pub use error::StoreError;
pub use file::FileStore;
