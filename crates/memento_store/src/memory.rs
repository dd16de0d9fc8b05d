//! In-memory store for testing.

use crate::action::WriteAction;
use crate::connection::{Shared, StoreConnection};
use crate::error::StoreResult;
use crate::key::EntityKey;
use crate::row::Row;
use crate::store::{DurableStore, StoreProvider};
use crate::tables::Tables;
use std::fmt;
use std::sync::Arc;

/// An in-memory durable store.
///
/// Committed rows live in memory and are shared by every connection and
/// every clone of the store. This store is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral data that doesn't need to survive the process
///
/// # Thread Safety
///
/// The store is thread-safe; each connection is owned by one context.
///
/// # Example
///
/// ```rust
/// use memento_store::{DurableStore, EntityKey, MemoryStore, Row, StoreProvider};
///
/// let store = MemoryStore::with_rows([
///     (EntityKey::new("memo", 1), Row::new().with("username", "Robbie")),
/// ])
/// .unwrap();
/// let mut conn = store.connect().unwrap();
/// let row = conn.load(&EntityKey::new("memo", 1)).unwrap();
/// assert_eq!(row.unwrap().text("username"), Some("Robbie"));
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new(Tables::default(), None)),
        }
    }

    /// Creates a store with pre-committed rows.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKey` if the same key appears twice.
    pub fn with_rows(rows: impl IntoIterator<Item = (EntityKey, Row)>) -> StoreResult<Self> {
        let actions: Vec<WriteAction> = rows
            .into_iter()
            .map(|(key, row)| WriteAction::insert(key, row))
            .collect();
        let mut tables = Tables::default();
        tables.apply(&actions)?;
        Ok(Self {
            shared: Arc::new(Shared::new(tables, None)),
        })
    }

    /// Returns the committed row stored under `key`.
    ///
    /// Useful for testing; staged writes of open connections are not visible.
    #[must_use]
    pub fn row(&self, key: &EntityKey) -> Option<Row> {
        self.shared.tables.read().get(key).cloned()
    }

    /// Returns the number of committed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.tables.read().len()
    }

    /// Returns true if no rows are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for MemoryStore {
    fn connect(&self) -> StoreResult<Box<dyn DurableStore>> {
        Ok(Box::new(StoreConnection::new(Arc::clone(&self.shared))))
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.len())
            .finish()
    }
}
