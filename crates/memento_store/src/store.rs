//! Durable store contract.

use crate::action::WriteAction;
use crate::error::StoreResult;
use crate::key::EntityKey;
use crate::row::Row;

/// A connection to a durable store, as seen by one persistence context.
///
/// Stores are **row stores**: they know nothing about record types,
/// identity maps or dirty checking. The persistence context owns all of
/// that and only ever calls the four operations below.
///
/// # Invariants
///
/// - `load` has no side effects on the caller's state
/// - `apply` is atomic: on error, none of the batch is staged
/// - `apply` stages writes; they become visible to other connections only
///   after `commit_durable`
/// - `rollback_durable` discards everything staged since the last commit
///
/// # Implementors
///
/// - [`crate::StoreConnection`] - connections of [`crate::MemoryStore`] and
///   [`crate::FileStore`]
pub trait DurableStore: Send {
    /// Loads the row stored under `key`.
    ///
    /// Rows staged by this connection but not yet committed are visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&mut self, key: &EntityKey) -> StoreResult<Option<Row>>;

    /// Applies an ordered batch of write actions.
    ///
    /// # Errors
    ///
    /// Returns an error if any action in the batch cannot be applied, in
    /// which case nothing is staged.
    fn apply(&mut self, actions: &[WriteAction]) -> StoreResult<()>;

    /// Makes every batch applied since the last commit durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the staged batches conflict with data committed
    /// concurrently or cannot be persisted. Staged writes are kept,
    /// so the caller can retry the commit or roll back.
    fn commit_durable(&mut self) -> StoreResult<()>;

    /// Discards every batch applied since the last commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot discard the staged writes.
    fn rollback_durable(&mut self) -> StoreResult<()>;
}

/// A source of store connections.
///
/// A context factory holds one provider and opens one connection per
/// persistence context.
pub trait StoreProvider: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot accept connections.
    fn connect(&self) -> StoreResult<Box<dyn DurableStore>>;
}
