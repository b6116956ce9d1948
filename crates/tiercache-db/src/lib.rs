//! Tiercache Database Layer
//!
//! This crate provides the table-backed cache store, using SQLite via sqlx
//! for persistence.

pub mod error;
pub mod models;
pub mod store;

pub use error::DbError;
pub use models::CacheRow;
pub use store::TableStore;
