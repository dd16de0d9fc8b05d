//! Error types for store operations.

use crate::key::EntityKey;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur inside a durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An insert targeted a key that already has a row.
    #[error("duplicate key: {0}")]
    DuplicateKey(EntityKey),

    /// An update or delete targeted a key without a row.
    #[error("no row for key: {0}")]
    MissingRow(EntityKey),

    /// A journal frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The journal is corrupted.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the journal lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store refused the request.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
