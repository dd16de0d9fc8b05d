//! Error types for the persistence context.

use memento_store::{EntityKey, StoreError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in persistence context operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The identity is already managed by this context.
    #[error("identity conflict: {key} is already managed")]
    IdentityConflict {
        /// The conflicting identity.
        key: EntityKey,
    },

    /// The operation requires a managed entity.
    #[error("entity {key} is not managed by this context")]
    NotManaged {
        /// The identity that is not managed.
        key: EntityKey,
    },

    /// The identity is scheduled for deletion and must be flushed first.
    #[error("entity {key} is removed; flush before reusing its identity")]
    EntityRemoved {
        /// The removed identity.
        key: EntityKey,
    },

    /// The context cannot accept the operation.
    #[error("invalid context state: {message}")]
    InvalidContextState {
        /// Description of the state problem.
        message: String,
    },

    /// The transaction cannot accept the operation.
    #[error("invalid transaction state: {message}")]
    InvalidTransactionState {
        /// Description of the state problem.
        message: String,
    },

    /// Writing to the store requires an active transaction.
    #[error("no active transaction: flush requires one")]
    TransactionRequired,

    /// The factory is closed.
    #[error("context factory is closed")]
    FactoryClosed,

    /// The identity is managed as a different record type.
    #[error("entity {key} is managed as a different type than {expected}")]
    KindMismatch {
        /// The identity.
        key: EntityKey,
        /// The requested Rust type.
        expected: &'static str,
    },

    /// A row could not be mapped to a record.
    #[error("cannot map row to {kind}: {message}")]
    RowMapping {
        /// The entity kind.
        kind: &'static str,
        /// Description of the mapping problem.
        message: String,
    },

    /// The durable store failed.
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

impl CoreError {
    /// Creates an invalid context state error.
    pub fn invalid_context_state(message: impl Into<String>) -> Self {
        Self::InvalidContextState {
            message: message.into(),
        }
    }

    /// Creates an invalid transaction state error.
    pub fn invalid_transaction_state(message: impl Into<String>) -> Self {
        Self::InvalidTransactionState {
            message: message.into(),
        }
    }

    /// Creates a row mapping error.
    pub fn row_mapping(kind: &'static str, message: impl Into<String>) -> Self {
        Self::RowMapping {
            kind,
            message: message.into(),
        }
    }

    /// Creates a row mapping error for a field that is absent or has the
    /// wrong type.
    pub fn missing_field(kind: &'static str, field: &str) -> Self {
        Self::row_mapping(kind, format!("field `{field}` is missing or mistyped"))
    }

    /// Returns true if the error came from the durable store.
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreFailure(_))
    }
}
