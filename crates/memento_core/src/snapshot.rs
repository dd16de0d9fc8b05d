//! Immutable record snapshots.

use memento_store::Row;

/// Field values of a managed record at the time it was last synchronized.
///
/// A snapshot is never edited in place; synchronizing produces a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot {
    row: Row,
}

impl Snapshot {
    pub(crate) fn new(row: Row) -> Self {
        Self { row }
    }

    /// Returns the fields of `current` that differ from this snapshot, or
    /// `None` if nothing changed.
    pub(crate) fn diff(&self, current: &Row) -> Option<Row> {
        let changes = current.changes_from(&self.row);
        (!changes.is_empty()).then_some(changes)
    }

    /// Returns the snapshot that results from writing `changes`.
    pub(crate) fn advanced(&self, changes: &Row) -> Self {
        let mut row = self.row.clone();
        row.overlay(changes);
        Self { row }
    }
}
