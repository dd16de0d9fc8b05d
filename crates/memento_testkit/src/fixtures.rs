//! Test fixtures and factory helpers.
//!
//! Provides the `Memo` test entity and context factories over memory and
//! file stores.

use memento_core::{ContextConfig, ContextFactory, CoreError, CoreResult, Entity};
use memento_store::{EntityId, EntityKey, FileStore, MemoryStore, Row, StoreProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A short note written by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo {
    /// Caller-assigned identifier.
    pub id: i64,
    /// Author name.
    pub username: String,
    /// Text of the memo.
    pub contents: String,
}

impl Memo {
    /// Creates a memo.
    pub fn new(id: i64, username: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            contents: contents.into(),
        }
    }

    /// Returns the identity of the memo with `id`.
    pub fn key_for(id: i64) -> EntityKey {
        EntityKey::new(Self::KIND, id)
    }
}

impl Entity for Memo {
    const KIND: &'static str = "memo";

    fn id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("username", self.username.as_str())
            .with("contents", self.contents.as_str())
    }

    fn from_row(id: EntityId, row: &Row) -> CoreResult<Self> {
        let username = row
            .text("username")
            .ok_or_else(|| CoreError::missing_field(Self::KIND, "username"))?;
        let contents = row
            .text("contents")
            .ok_or_else(|| CoreError::missing_field(Self::KIND, "contents"))?;
        Ok(Self::new(id.as_i64(), username, contents))
    }
}

/// The store behind a [`TestFactory`].
#[derive(Debug, Clone)]
pub enum TestStore {
    /// An in-memory store.
    Memory(MemoryStore),
    /// A journal-backed store.
    File(FileStore),
}

impl TestStore {
    /// Returns the committed row under `key`.
    pub fn row(&self, key: &EntityKey) -> Option<Row> {
        match self {
            Self::Memory(store) => store.row(key),
            Self::File(store) => store.row(key),
        }
    }

    /// Returns the number of committed rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Memory(store) => store.len(),
            Self::File(store) => store.len(),
        }
    }

    /// Returns true if no rows are committed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn provider(&self) -> Arc<dyn StoreProvider> {
        match self {
            Self::Memory(store) => Arc::new(store.clone()),
            Self::File(store) => Arc::new(store.clone()),
        }
    }
}

/// A context factory with direct access to its store.
pub struct TestFactory {
    /// The factory.
    pub factory: ContextFactory,
    /// The store the factory's contexts connect to.
    pub store: TestStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestFactory {
    /// Creates a factory over an empty memory store.
    pub fn memory() -> Self {
        Self::over(TestStore::Memory(MemoryStore::new()), ContextConfig::default())
    }

    /// Creates a factory over a memory store holding `memos`.
    ///
    /// # Panics
    ///
    /// Panics if two memos share an id.
    pub fn memory_with(memos: &[Memo]) -> Self {
        let store = MemoryStore::with_rows(memos.iter().map(|memo| (memo.key(), memo.to_row())))
            .expect("Failed to seed memory store");
        Self::over(TestStore::Memory(store), ContextConfig::default())
    }

    /// Creates a factory over a file store in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut fixture = Self::file_at(&temp_dir.path().join("memo.journal"));
        fixture._temp_dir = Some(temp_dir);
        fixture
    }

    /// Creates a factory over a file store at `path`.
    ///
    /// The caller owns the directory; use this to reopen a journal.
    pub fn file_at(path: &Path) -> Self {
        let store = FileStore::open(path).expect("Failed to open file store");
        Self::over(TestStore::File(store), ContextConfig::default())
    }

    /// Creates a factory over `store` with a custom config.
    pub fn over(store: TestStore, config: ContextConfig) -> Self {
        Self {
            factory: ContextFactory::new(store.provider(), config),
            store,
            _temp_dir: None,
        }
    }

    /// Returns the journal path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        match &self.store {
            TestStore::File(store) => Some(store.path().to_path_buf()),
            TestStore::Memory(_) => None,
        }
    }

    /// Returns the committed memo with `id`, read straight from the store.
    pub fn stored_memo(&self, id: i64) -> Option<Memo> {
        let row = self.store.row(&Memo::key_for(id))?;
        Memo::from_row(EntityId::new(id), &row).ok()
    }

    /// Returns the number of committed rows.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no rows are committed.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl std::ops::Deref for TestFactory {
    type Target = ContextFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs a test with a factory over an empty memory store.
///
/// # Example
///
/// ```rust
/// use memento_testkit::{with_memory_factory, Memo};
///
/// with_memory_factory(|fixture| {
///     let mut ctx = fixture.create_context().unwrap();
///     assert!(ctx.find::<Memo>(1).unwrap().is_none());
/// });
/// ```
pub fn with_memory_factory<F, R>(f: F) -> R
where
    F: FnOnce(&TestFactory) -> R,
{
    let fixture = TestFactory::memory();
    f(&fixture)
}

/// Runs a test with a factory over a temporary file store.
pub fn with_file_factory<F, R>(f: F) -> R
where
    F: FnOnce(&TestFactory) -> R,
{
    let fixture = TestFactory::file();
    f(&fixture)
}

/// The memos the end-to-end scenarios start from.
pub fn sample_memos() -> Vec<Memo> {
    vec![
        Memo::new(1, "Robbie", "hello"),
        Memo::new(2, "Robbert", "bye"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_row_round_trip() {
        let memo = Memo::new(1, "Robbie", "hello");
        let back = Memo::from_row(memo.id(), &memo.to_row()).unwrap();
        assert_eq!(back, memo);
    }

    #[test]
    fn memo_from_incomplete_row_fails() {
        let row = Row::new().with("username", "Robbie");
        let result = Memo::from_row(EntityId::new(1), &row);
        assert!(matches!(result, Err(CoreError::RowMapping { .. })));
    }

    #[test]
    fn memory_fixture_is_seeded() {
        let fixture = TestFactory::memory_with(&sample_memos());
        assert_eq!(fixture.len(), 2);
        assert_eq!(fixture.stored_memo(1), Some(Memo::new(1, "Robbie", "hello")));
        assert!(fixture.path().is_none());
    }

    #[test]
    fn file_fixture_persists_through_contexts() {
        with_file_factory(|fixture| {
            assert!(fixture.path().is_some());
            let mut ctx = fixture.create_context().unwrap();
            ctx.transaction(|ctx| ctx.save(Memo::new(9, "a", "b")))
                .unwrap();
            assert_eq!(fixture.stored_memo(9), Some(Memo::new(9, "a", "b")));
        });
    }
}
