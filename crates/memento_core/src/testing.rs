//! Test entities and stores for unit tests.

use crate::config::ContextConfig;
use crate::context::PersistenceContext;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use memento_store::{
    DurableStore, EntityId, EntityKey, MemoryStore, Row, StoreError, StoreProvider, StoreResult,
    WriteAction,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Note {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) body: String,
}

impl Note {
    pub(crate) fn new(id: i64, title: &str, body: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}

impl Entity for Note {
    const KIND: &'static str = "note";

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("title", self.title.as_str())
            .with("body", self.body.as_str())
    }

    fn from_row(id: EntityId, row: &Row) -> CoreResult<Self> {
        let title = row
            .text("title")
            .ok_or_else(|| CoreError::missing_field(Self::KIND, "title"))?;
        let body = row
            .text("body")
            .ok_or_else(|| CoreError::missing_field(Self::KIND, "body"))?;
        Ok(Self::new(id.as_i64(), title, body))
    }
}

/// A second record type that shares the `note` kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteTitle {
    pub(crate) id: i64,
    pub(crate) title: String,
}

impl Entity for NoteTitle {
    const KIND: &'static str = "note";

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn to_row(&self) -> Row {
        Row::new().with("title", self.title.as_str())
    }

    fn from_row(id: EntityId, row: &Row) -> CoreResult<Self> {
        let title = row
            .text("title")
            .ok_or_else(|| CoreError::missing_field(Self::KIND, "title"))?;
        Ok(Self {
            id: id.as_i64(),
            title: title.to_string(),
        })
    }
}

pub(crate) fn note_key(id: i64) -> EntityKey {
    EntityKey::new(Note::KIND, id)
}

/// A memory store holding `notes`.
pub(crate) fn store_with(notes: &[Note]) -> MemoryStore {
    MemoryStore::with_rows(notes.iter().map(|note| (note.key(), note.to_row()))).unwrap()
}

pub(crate) fn context_on(store: &MemoryStore) -> PersistenceContext {
    PersistenceContext::new(store.connect().unwrap(), ContextConfig::default())
}

/// Switches and counters shared with a [`FlakyStore`].
#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub(crate) fail_load: AtomicBool,
    pub(crate) fail_apply: AtomicBool,
    pub(crate) fail_commit: AtomicBool,
    pub(crate) applies: AtomicUsize,
    pub(crate) rollbacks: AtomicUsize,
}

/// Wraps a store connection and fails on demand.
pub(crate) struct FlakyStore {
    inner: Box<dyn DurableStore>,
    faults: Arc<Faults>,
}

impl FlakyStore {
    pub(crate) fn context_on(store: &MemoryStore) -> (PersistenceContext, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        let flaky = Self {
            inner: store.connect().unwrap(),
            faults: Arc::clone(&faults),
        };
        let ctx = PersistenceContext::new(Box::new(flaky), ContextConfig::default());
        (ctx, faults)
    }
}

impl DurableStore for FlakyStore {
    fn load(&mut self, key: &EntityKey) -> StoreResult<Option<Row>> {
        if self.faults.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::rejected("load disabled"));
        }
        self.inner.load(key)
    }

    fn apply(&mut self, actions: &[WriteAction]) -> StoreResult<()> {
        self.faults.applies.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_apply.load(Ordering::SeqCst) {
            return Err(StoreError::rejected("apply disabled"));
        }
        self.inner.apply(actions)
    }

    fn commit_durable(&mut self) -> StoreResult<()> {
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::rejected("commit disabled"));
        }
        self.inner.commit_durable()
    }

    fn rollback_durable(&mut self) -> StoreResult<()> {
        self.faults.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback_durable()
    }
}
