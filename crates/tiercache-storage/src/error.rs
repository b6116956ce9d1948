//! Storage error types

use thiserror::Error;

use crate::envelope::EnvelopeError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Malformed envelope: {0}")]
    Envelope(#[from] EnvelopeError),
}
