//! Transaction coordination.
//!
//! A context runs at most one transaction at a time:
//!
//! - `begin` starts it
//! - `commit` flushes, then asks the store to make the batch durable
//! - `rollback` discards the queue and the identity map without applying
//!   anything, then asks the store to drop whatever it staged

use crate::context::PersistenceContext;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use tracing::{debug, warn};

/// Tracks the active transaction of one context.
#[derive(Debug, Default)]
pub(crate) struct TransactionCoordinator {
    last_id: TransactionId,
    active: Option<TransactionId>,
}

impl TransactionCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` if one is already active.
    pub(crate) fn begin(&mut self) -> CoreResult<TransactionId> {
        if let Some(active) = self.active {
            return Err(CoreError::invalid_transaction_state(format!(
                "transaction {active} is already active"
            )));
        }
        let id = self.last_id.next();
        self.last_id = id;
        self.active = Some(id);
        Ok(id)
    }

    /// Returns the active transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` if none is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<TransactionId> {
        self.active
            .ok_or_else(|| CoreError::invalid_transaction_state("no active transaction"))
    }

    /// Ends the active transaction, if any.
    pub(crate) fn finish(&mut self) -> Option<TransactionId> {
        self.active.take()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) fn current(&self) -> Option<TransactionId> {
        self.active
    }
}

impl PersistenceContext {
    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` if a transaction is already active.
    pub fn begin(&mut self) -> CoreResult<TransactionId> {
        self.ensure_open()?;
        let txn = self.coordinator.begin()?;
        self.stats.record_begin();
        debug!(context = %self.id, %txn, "transaction begun");
        Ok(txn)
    }

    /// Commits the active transaction.
    ///
    /// Flushes pending changes, then signals the store to make them
    /// durable. If either step fails the transaction stays active, so the
    /// caller can retry or roll back.
    ///
    /// # Errors
    ///
    /// - `InvalidTransactionState` if no transaction is active
    /// - `StoreFailure` if the flush or the durable commit fails
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let txn = self.coordinator.ensure_active()?;

        let written = self.flush_batch()?;
        self.store.commit_durable()?;

        self.coordinator.finish();
        self.stats.record_commit();
        debug!(context = %self.id, %txn, written, "transaction committed");
        Ok(())
    }

    /// Rolls back the active transaction.
    ///
    /// Queued actions are dropped without reaching the store, and every
    /// managed instance is detached.
    ///
    /// # Errors
    ///
    /// - `InvalidTransactionState` if no transaction is active
    /// - `StoreFailure` if the store cannot discard its staged writes; the
    ///   context is rolled back regardless
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let txn = self.coordinator.ensure_active()?;

        let discarded = self.queue.clear();
        let detached = self.entries.clear();
        self.coordinator.finish();
        self.stats.record_rollback();
        debug!(context = %self.id, %txn, discarded, detached, "transaction rolled back");

        self.store.rollback_durable()?;
        Ok(())
    }

    /// Returns true if a transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.coordinator.is_active()
    }

    /// Returns the active transaction, if any.
    #[must_use]
    pub fn current_transaction(&self) -> Option<TransactionId> {
        self.coordinator.current()
    }

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, or the commit fails, the transaction is rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Returns the function's error, or the error of `begin` or `commit`.
    pub fn transaction<F, R>(&mut self, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Self) -> CoreResult<R>,
    {
        self.begin()?;
        let result = f(self).and_then(|value| self.commit().map(|()| value));

        if result.is_err() && self.is_active() {
            if let Err(err) = self.rollback() {
                warn!(context = %self.id, error = %err, "rollback after failed transaction failed");
            }
        }
        result
    }
}
