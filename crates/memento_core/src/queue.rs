//! Write-behind queue.

use memento_store::{EntityKey, WriteAction};

/// Pending write actions, in the order they were queued.
#[derive(Debug, Default)]
pub(crate) struct WriteQueue {
    actions: Vec<WriteAction>,
}

impl WriteQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, action: WriteAction) {
        self.actions.push(action);
    }

    pub(crate) fn as_slice(&self) -> &[WriteAction] {
        &self.actions
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    /// Drops every queued action.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.actions.len();
        self.actions.clear();
        count
    }

    /// Drops queued actions for `key`.
    pub(crate) fn prune(&mut self, key: &EntityKey) -> usize {
        let before = self.actions.len();
        self.actions.retain(|action| action.key() != key);
        before - self.actions.len()
    }

    /// Builds the batch for one flush: queued actions followed by
    /// `generated`, stably sorted into inserts, then updates, then deletes.
    ///
    /// The queue itself is left as is.
    pub(crate) fn ordered_batch(&self, generated: Vec<WriteAction>) -> Vec<WriteAction> {
        let mut batch = Vec::with_capacity(self.actions.len() + generated.len());
        batch.extend_from_slice(&self.actions);
        batch.extend(generated);
        batch.sort_by_key(WriteAction::kind);
        batch
    }
}
