//! Write actions.

use crate::key::EntityKey;
use crate::row::Row;
use serde::{Deserialize, Serialize};

/// Kind of a write action.
///
/// The derived ordering is the order in which a flush submits actions:
/// all inserts, then all updates, then all deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    /// Insert a new row.
    Insert,
    /// Update fields of an existing row.
    Update,
    /// Delete an existing row.
    Delete,
}

/// A deferred write bound for a durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteAction {
    /// Insert a new row.
    Insert {
        /// Identity of the new record.
        key: EntityKey,
        /// Field values at the time the insert was queued.
        row: Row,
    },
    /// Update fields of an existing row.
    Update {
        /// Identity of the updated record.
        key: EntityKey,
        /// Only the fields that changed, with their new values.
        changes: Row,
    },
    /// Delete an existing row.
    Delete {
        /// Identity of the deleted record.
        key: EntityKey,
    },
}

impl WriteAction {
    /// Creates an insert action.
    pub fn insert(key: EntityKey, row: Row) -> Self {
        Self::Insert { key, row }
    }

    /// Creates an update action.
    pub fn update(key: EntityKey, changes: Row) -> Self {
        Self::Update { key, changes }
    }

    /// Creates a delete action.
    pub fn delete(key: EntityKey) -> Self {
        Self::Delete { key }
    }

    /// Returns the action kind.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Insert { .. } => ActionKind::Insert,
            Self::Update { .. } => ActionKind::Update,
            Self::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Returns the identity the action targets.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Delete { key } => key,
        }
    }
}
