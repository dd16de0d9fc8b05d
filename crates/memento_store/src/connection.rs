//! Store connections with private staging.

use crate::action::WriteAction;
use crate::error::StoreResult;
use crate::file::Journal;
use crate::key::EntityKey;
use crate::row::Row;
use crate::store::DurableStore;
use crate::tables::{plan, Plan, Tables};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// State shared by a store and all of its connections.
pub(crate) struct Shared {
    /// Committed rows.
    pub(crate) tables: RwLock<Tables>,
    /// Journal that committed batches are appended to. None for memory stores.
    pub(crate) journal: Option<Mutex<Journal>>,
}

impl Shared {
    pub(crate) fn new(tables: Tables, journal: Option<Journal>) -> Self {
        Self {
            tables: RwLock::new(tables),
            journal: journal.map(Mutex::new),
        }
    }
}

/// A connection to a [`MemoryStore`](crate::MemoryStore) or
/// [`FileStore`](crate::FileStore).
///
/// Applied batches are staged privately: this connection reads its own
/// staged writes, other connections do not see them until
/// [`commit_durable`](DurableStore::commit_durable).
pub struct StoreConnection {
    shared: Arc<Shared>,
    /// Actions applied since the last commit, in order.
    staged: Vec<WriteAction>,
    /// Effect of `staged` per key, layered over the committed rows.
    overlay: Plan,
}

impl StoreConnection {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            staged: Vec::new(),
            overlay: Plan::new(),
        }
    }

    /// Returns the number of actions staged since the last commit.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    fn discard(&mut self) {
        self.staged.clear();
        self.overlay.clear();
    }
}

impl DurableStore for StoreConnection {
    fn load(&mut self, key: &EntityKey) -> StoreResult<Option<Row>> {
        if let Some(state) = self.overlay.get(key) {
            return Ok(state.clone());
        }
        Ok(self.shared.tables.read().get(key).cloned())
    }

    fn apply(&mut self, actions: &[WriteAction]) -> StoreResult<()> {
        let batch = {
            let tables = self.shared.tables.read();
            let overlay = &self.overlay;
            plan(actions, |key| match overlay.get(key) {
                Some(state) => state.clone(),
                None => tables.get(key).cloned(),
            })?
        };

        self.overlay.extend(batch);
        self.staged.extend_from_slice(actions);
        Ok(())
    }

    fn commit_durable(&mut self) -> StoreResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }

        {
            // Holding the write lock keeps journal order equal to commit order.
            let mut tables = self.shared.tables.write();
            let batch = plan(&self.staged, |key| tables.get(key).cloned())?;

            if let Some(journal) = &self.shared.journal {
                journal.lock().append(&self.staged)?;
            }

            tables.commit(batch);
        }

        self.discard();
        Ok(())
    }

    fn rollback_durable(&mut self) -> StoreResult<()> {
        self.discard();
        Ok(())
    }
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection")
            .field("staged", &self.staged.len())
            .finish_non_exhaustive()
    }
}
