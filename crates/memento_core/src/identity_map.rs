//! Identity map over an arena of managed entries.
//!
//! Entries live in slots addressed by [`EntityRef`](crate::EntityRef)
//! handles. Each entry carries a stamp that is unique for the lifetime of
//! the map, so a handle resolves only to the entry it was issued for, even
//! after its slot has been reused.

use crate::entity::ManagedRecord;
use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use memento_store::EntityKey;
use std::collections::HashMap;

/// Lifecycle state of an entry in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Managed,
    Removed,
}

/// A tracked record: identity, live instance, snapshot and state.
#[derive(Debug)]
pub(crate) struct ManagedEntry {
    pub(crate) key: EntityKey,
    pub(crate) stamp: u64,
    pub(crate) record: Box<dyn ManagedRecord>,
    pub(crate) snapshot: Snapshot,
    pub(crate) state: EntryState,
}

impl ManagedEntry {
    pub(crate) fn is_managed(&self) -> bool {
        self.state == EntryState::Managed
    }
}

/// At most one entry per identity.
#[derive(Debug, Default)]
pub(crate) struct IdentityMap {
    slots: Vec<Option<ManagedEntry>>,
    free: Vec<u32>,
    index: HashMap<EntityKey, u32>,
    next_stamp: u64,
}

impl IdentityMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the slot and entry for `key`.
    pub(crate) fn lookup(&self, key: &EntityKey) -> Option<(u32, &ManagedEntry)> {
        let slot = *self.index.get(key)?;
        let entry = self.slots.get(slot as usize)?.as_ref()?;
        Some((slot, entry))
    }

    pub(crate) fn lookup_mut(&mut self, key: &EntityKey) -> Option<(u32, &mut ManagedEntry)> {
        let slot = *self.index.get(key)?;
        let entry = self.slots.get_mut(slot as usize)?.as_mut()?;
        Some((slot, entry))
    }

    /// Tracks a new instance in state `Managed`.
    ///
    /// Returns the slot and stamp of the new entry.
    ///
    /// # Errors
    ///
    /// Returns `IdentityConflict` if `key` already has an entry.
    pub(crate) fn insert(
        &mut self,
        key: EntityKey,
        record: Box<dyn ManagedRecord>,
        snapshot: Snapshot,
    ) -> CoreResult<(u32, u64)> {
        if self.index.contains_key(&key) {
            return Err(CoreError::IdentityConflict { key });
        }

        self.next_stamp += 1;
        let stamp = self.next_stamp;
        let entry = ManagedEntry {
            key: key.clone(),
            stamp,
            record,
            snapshot,
            state: EntryState::Managed,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                slot
            }
            None => {
                let slot = u32::try_from(self.slots.len()).map_err(|_| {
                    CoreError::invalid_context_state("identity map is full")
                })?;
                self.slots.push(Some(entry));
                slot
            }
        };

        self.index.insert(key, slot);
        Ok((slot, stamp))
    }

    /// Resolves a handle to its entry.
    pub(crate) fn resolve(&self, slot: u32, stamp: u64) -> Option<&ManagedEntry> {
        self.slots
            .get(slot as usize)?
            .as_ref()
            .filter(|entry| entry.stamp == stamp)
    }

    pub(crate) fn resolve_mut(&mut self, slot: u32, stamp: u64) -> Option<&mut ManagedEntry> {
        self.slots
            .get_mut(slot as usize)?
            .as_mut()
            .filter(|entry| entry.stamp == stamp)
    }

    /// Removes the entry a handle refers to.
    pub(crate) fn take(&mut self, slot: u32, stamp: u64) -> Option<ManagedEntry> {
        self.resolve(slot, stamp)?;
        self.vacate(slot)
    }

    /// Removes the entry for `key`. Removing an absent key is a no-op.
    pub(crate) fn remove(&mut self, key: &EntityKey) -> Option<ManagedEntry> {
        let slot = *self.index.get(key)?;
        self.vacate(slot)
    }

    fn vacate(&mut self, slot: u32) -> Option<ManagedEntry> {
        let entry = self.slots.get_mut(slot as usize)?.take()?;
        self.index.remove(&entry.key);
        self.free.push(slot);
        Some(entry)
    }

    /// Drops every entry. Stamps keep increasing afterwards.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.index.len();
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        count
    }

    /// Returns the number of entries, removed ones included.
    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns the number of entries in state `Managed`.
    pub(crate) fn managed_count(&self) -> usize {
        self.entries().filter(|entry| entry.is_managed()).count()
    }

    /// Iterates entries in the order they were inserted.
    pub(crate) fn in_insertion_order(&self) -> Vec<&ManagedEntry> {
        let mut entries: Vec<&ManagedEntry> = self.entries().collect();
        entries.sort_by_key(|entry| entry.stamp);
        entries
    }

    fn entries(&self) -> impl Iterator<Item = &ManagedEntry> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::testing::Note;

    fn track(map: &mut IdentityMap, note: Note) -> CoreResult<(u32, u64)> {
        let snapshot = Snapshot::new(note.to_row());
        map.insert(note.key(), Box::new(note), snapshot)
    }

    #[test]
    fn insert_then_lookup() {
        let mut map = IdentityMap::new();
        let (slot, stamp) = track(&mut map, Note::new(1, "a", "b")).unwrap();

        let (found_slot, entry) = map.lookup(&EntityKey::new("note", 1)).unwrap();
        assert_eq!(found_slot, slot);
        assert_eq!(entry.stamp, stamp);
        assert!(entry.is_managed());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn duplicate_identity_conflicts() {
        let mut map = IdentityMap::new();
        track(&mut map, Note::new(1, "a", "b")).unwrap();
        let result = track(&mut map, Note::new(1, "c", "d"));
        assert!(matches!(result, Err(CoreError::IdentityConflict { .. })));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut map = IdentityMap::new();
        track(&mut map, Note::new(1, "a", "b")).unwrap();
        let key = EntityKey::new("note", 1);

        assert!(map.remove(&key).is_some());
        assert!(map.remove(&key).is_none());
        assert!(map.lookup(&key).is_none());
    }

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut map = IdentityMap::new();
        let (slot, stamp) = track(&mut map, Note::new(1, "a", "b")).unwrap();
        map.remove(&EntityKey::new("note", 1));

        let (new_slot, new_stamp) = track(&mut map, Note::new(1, "a", "b")).unwrap();
        assert_eq!(new_slot, slot);
        assert_ne!(new_stamp, stamp);
        assert!(map.resolve(slot, stamp).is_none());
        assert!(map.resolve(new_slot, new_stamp).is_some());
    }

    #[test]
    fn stamps_survive_clear() {
        let mut map = IdentityMap::new();
        let (_, first) = track(&mut map, Note::new(1, "a", "b")).unwrap();
        assert_eq!(map.clear(), 1);
        let (_, second) = track(&mut map, Note::new(1, "a", "b")).unwrap();
        assert!(second > first);
    }

    #[test]
    fn insertion_order_ignores_slot_reuse() {
        let mut map = IdentityMap::new();
        track(&mut map, Note::new(1, "a", "b")).unwrap();
        track(&mut map, Note::new(2, "a", "b")).unwrap();
        map.remove(&EntityKey::new("note", 1));
        track(&mut map, Note::new(3, "a", "b")).unwrap();

        let ids: Vec<i64> = map
            .in_insertion_order()
            .iter()
            .map(|entry| entry.key.id().as_i64())
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn managed_count_skips_removed() {
        let mut map = IdentityMap::new();
        track(&mut map, Note::new(1, "a", "b")).unwrap();
        track(&mut map, Note::new(2, "a", "b")).unwrap();
        map.lookup_mut(&EntityKey::new("note", 2)).unwrap().1.state = EntryState::Removed;

        assert_eq!(map.len(), 2);
        assert_eq!(map.managed_count(), 1);
    }
}
