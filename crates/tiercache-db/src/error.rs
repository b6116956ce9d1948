//! Database error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}
