//! The persistence context.
//!
//! A context owns one store connection, an identity map of managed
//! instances and a write-behind queue. Callers work with records through
//! [`EntityRef`] handles; field changes on managed instances are picked up
//! by dirty checking at flush time, so there is no explicit update call.

use crate::config::ContextConfig;
use crate::entity::{key_of, Entity, EntityRef, EntityState};
use crate::error::{CoreError, CoreResult};
use crate::identity_map::{EntryState, IdentityMap, ManagedEntry};
use crate::queue::WriteQueue;
use crate::snapshot::Snapshot;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::transaction::TransactionCoordinator;
use crate::types::ContextId;
use memento_store::{DurableStore, EntityId, EntityKey, WriteAction};
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// An in-memory session over a durable store.
///
/// The context guarantees object identity per record: while an identity is
/// managed, every [`find`](Self::find) returns a handle to the same
/// instance, and the store is asked for it at most once.
///
/// Writes are deferred. [`save`](Self::save), [`remove`](Self::remove) and
/// [`merge`](Self::merge) only queue actions; [`flush`](Self::flush) (or
/// [`commit`](Self::commit)) hands them to the store together with the
/// updates generated by dirty checking.
///
/// A context is single-owner and not meant to be shared between threads;
/// use one context per thread of control.
///
/// # Example
///
/// ```rust
/// use memento_core::{ContextConfig, CoreError, CoreResult, Entity, PersistenceContext};
/// use memento_store::{EntityId, MemoryStore, Row, StoreProvider};
///
/// #[derive(Debug, Clone)]
/// struct Memo {
///     id: i64,
///     username: String,
/// }
///
/// impl Entity for Memo {
///     const KIND: &'static str = "memo";
///
///     fn id(&self) -> EntityId {
///         EntityId::new(self.id)
///     }
///
///     fn to_row(&self) -> Row {
///         Row::new().with("username", self.username.as_str())
///     }
///
///     fn from_row(id: EntityId, row: &Row) -> CoreResult<Self> {
///         let username = row
///             .text("username")
///             .ok_or_else(|| CoreError::missing_field(Self::KIND, "username"))?;
///         Ok(Self { id: id.as_i64(), username: username.to_string() })
///     }
/// }
///
/// let store = MemoryStore::new();
/// let mut ctx = PersistenceContext::new(store.connect().unwrap(), ContextConfig::default());
///
/// ctx.transaction(|ctx| {
///     ctx.save(Memo { id: 1, username: "Robbie".into() })?;
///     Ok(())
/// })
/// .unwrap();
///
/// ctx.transaction(|ctx| {
///     let memo = ctx.find::<Memo>(1)?.unwrap();
///     ctx.get_mut(&memo)?.username = "Update".into();
///     Ok(())
/// })
/// .unwrap();
///
/// let memo = ctx.find::<Memo>(1).unwrap().unwrap();
/// assert_eq!(ctx.get(&memo).unwrap().username, "Update");
/// ```
pub struct PersistenceContext {
    pub(crate) id: ContextId,
    pub(crate) store: Box<dyn DurableStore>,
    config: ContextConfig,
    pub(crate) entries: IdentityMap,
    pub(crate) queue: WriteQueue,
    pub(crate) coordinator: TransactionCoordinator,
    pub(crate) stats: Arc<SessionStats>,
    open: bool,
}

impl PersistenceContext {
    /// Creates a context over a store connection.
    #[must_use]
    pub fn new(store: Box<dyn DurableStore>, config: ContextConfig) -> Self {
        Self::with_stats(store, config, Arc::new(SessionStats::new()))
    }

    pub(crate) fn with_stats(
        store: Box<dyn DurableStore>,
        config: ContextConfig,
        stats: Arc<SessionStats>,
    ) -> Self {
        let id = ContextId::allocate();
        debug!(context = %id, "context opened");
        Self {
            id,
            store,
            config,
            entries: IdentityMap::new(),
            queue: WriteQueue::new(),
            coordinator: TransactionCoordinator::new(),
            stats,
            open: true,
        }
    }

    /// Returns the context ID.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(CoreError::invalid_context_state("context is closed"))
        }
    }

    /// Finds a record by identifier.
    ///
    /// A managed identity is answered from the identity map; otherwise the
    /// store is asked and a found row becomes a new managed instance.
    /// Removed identities read as not found.
    ///
    /// # Errors
    ///
    /// - `InvalidContextState` if the context is closed
    /// - `KindMismatch` if the identity is managed as another type
    /// - `RowMapping` if the stored row cannot be mapped to `T`
    /// - `StoreFailure` if the load fails
    pub fn find<T: Entity>(&mut self, id: impl Into<EntityId>) -> CoreResult<Option<EntityRef<T>>> {
        self.ensure_open()?;
        let id = id.into();
        let key = key_of::<T>(id);

        if let Some((slot, entry)) = self.entries.lookup(&key) {
            if !entry.is_managed() {
                trace!(context = %self.id, %key, "find of removed entity");
                return Ok(None);
            }
            if !entry.record.as_any().is::<T>() {
                return Err(kind_mismatch::<T>(key));
            }
            self.stats.record_cache_hit();
            trace!(context = %self.id, %key, "identity map hit");
            return Ok(Some(EntityRef::new(slot, entry.stamp, id)));
        }

        self.stats.record_load();
        let Some(row) = self.store.load(&key)? else {
            trace!(context = %self.id, %key, "not found in store");
            return Ok(None);
        };

        let record = T::from_row(id, &row)?;
        let snapshot = Snapshot::new(record.to_row());
        let (slot, stamp) = self.entries.insert(key.clone(), Box::new(record), snapshot)?;
        trace!(context = %self.id, %key, "loaded from store");
        Ok(Some(EntityRef::new(slot, stamp, id)))
    }

    /// Returns the instance a handle refers to.
    ///
    /// Removed instances stay readable until the removal is flushed.
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` for a detached handle.
    pub fn get<T: Entity>(&self, handle: &EntityRef<T>) -> CoreResult<&T> {
        self.ensure_open()?;
        let entry = self
            .entries
            .resolve(handle.slot(), handle.stamp())
            .ok_or_else(|| CoreError::NotManaged { key: handle.key() })?;
        entry
            .record
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| kind_mismatch::<T>(handle.key()))
    }

    /// Returns the instance a handle refers to, for modification.
    ///
    /// Changes are detected at the next flush.
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` for a detached handle and `EntityRemoved` for a
    /// removed one.
    pub fn get_mut<T: Entity>(&mut self, handle: &EntityRef<T>) -> CoreResult<&mut T> {
        self.ensure_open()?;
        let entry = self
            .entries
            .resolve_mut(handle.slot(), handle.stamp())
            .ok_or_else(|| CoreError::NotManaged { key: handle.key() })?;
        if !entry.is_managed() {
            return Err(CoreError::EntityRemoved { key: handle.key() });
        }
        entry
            .record
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| kind_mismatch::<T>(handle.key()))
    }

    /// Makes a transient record managed and queues its insert.
    ///
    /// The store is not touched until flush.
    ///
    /// # Errors
    ///
    /// - `IdentityConflict` if the identity is already managed
    /// - `EntityRemoved` if the identity is removed but not yet flushed
    pub fn save<T: Entity>(&mut self, record: T) -> CoreResult<EntityRef<T>> {
        self.ensure_open()?;
        let id = record.id();
        let key = record.key();
        self.ensure_untracked(&key)?;

        let row = record.to_row();
        let snapshot = Snapshot::new(row.clone());
        let (slot, stamp) = self.entries.insert(key.clone(), Box::new(record), snapshot)?;
        self.queue.push(WriteAction::insert(key.clone(), row));

        debug!(context = %self.id, %key, "entity saved");
        Ok(EntityRef::new(slot, stamp, id))
    }

    /// Schedules a managed record for deletion.
    ///
    /// The identity reads as not found from now on.
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` unless the handle refers to a managed instance.
    pub fn remove<T: Entity>(&mut self, handle: &EntityRef<T>) -> CoreResult<()> {
        self.ensure_open()?;
        let entry = self
            .entries
            .resolve_mut(handle.slot(), handle.stamp())
            .filter(|entry| entry.is_managed())
            .ok_or_else(|| CoreError::NotManaged { key: handle.key() })?;

        entry.state = EntryState::Removed;
        let key = entry.key.clone();
        self.queue.push(WriteAction::delete(key.clone()));

        debug!(context = %self.id, %key, "entity removed");
        Ok(())
    }

    /// Stops tracking an instance and hands it back.
    ///
    /// Queued writes for the identity stay scheduled unless
    /// [`ContextConfig::prune_detached_writes`] is set.
    ///
    /// # Errors
    ///
    /// Returns `NotManaged` if the handle is already detached.
    pub fn detach<T: Entity>(&mut self, handle: EntityRef<T>) -> CoreResult<T> {
        self.ensure_open()?;
        let entry = self
            .entries
            .resolve(handle.slot(), handle.stamp())
            .ok_or_else(|| CoreError::NotManaged { key: handle.key() })?;
        if !entry.record.as_any().is::<T>() {
            return Err(kind_mismatch::<T>(handle.key()));
        }

        let Some(entry) = self.entries.take(handle.slot(), handle.stamp()) else {
            return Err(CoreError::NotManaged { key: handle.key() });
        };

        let pruned = if self.config.prune_detached_writes {
            self.queue.prune(&entry.key)
        } else {
            0
        };
        debug!(context = %self.id, key = %entry.key, pruned, "entity detached");

        entry
            .record
            .into_any()
            .downcast::<T>()
            .map(|record| *record)
            .map_err(|_| kind_mismatch::<T>(handle.key()))
    }

    /// Copies a record's values onto the managed instance of its identity.
    ///
    /// - A managed instance takes the argument's values and is returned
    /// - An untracked identity found in the store becomes managed with the
    ///   stored values as snapshot and the argument's values as state, so
    ///   the next flush writes an update
    /// - An identity unknown to the store becomes managed and queues an
    ///   insert
    ///
    /// The argument itself is never tracked.
    ///
    /// # Errors
    ///
    /// - `EntityRemoved` if the identity is removed but not yet flushed
    /// - `KindMismatch` if the identity is managed as another type
    /// - `StoreFailure` if the load fails
    pub fn merge<T: Entity>(&mut self, record: &T) -> CoreResult<EntityRef<T>> {
        self.ensure_open()?;
        let id = record.id();
        let key = record.key();

        if let Some((slot, entry)) = self.entries.lookup_mut(&key) {
            if !entry.is_managed() {
                return Err(CoreError::EntityRemoved { key });
            }
            let stamp = entry.stamp;
            let tracked = entry
                .record
                .as_any_mut()
                .downcast_mut::<T>()
                .ok_or_else(|| kind_mismatch::<T>(key.clone()))?;
            tracked.clone_from(record);
            trace!(context = %self.id, %key, "merged into managed instance");
            return Ok(EntityRef::new(slot, stamp, id));
        }

        self.stats.record_load();
        let (merged, snapshot) = match self.store.load(&key)? {
            Some(row) => {
                let mut merged = T::from_row(id, &row)?;
                let snapshot = Snapshot::new(merged.to_row());
                merged.clone_from(record);
                (merged, snapshot)
            }
            None => {
                let merged = record.clone();
                let row = merged.to_row();
                self.queue.push(WriteAction::insert(key.clone(), row.clone()));
                (merged, Snapshot::new(row))
            }
        };

        let (slot, stamp) = self.entries.insert(key.clone(), Box::new(merged), snapshot)?;
        debug!(context = %self.id, %key, "entity merged");
        Ok(EntityRef::new(slot, stamp, id))
    }

    /// Returns true if the handle refers to a managed instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidContextState` if the context is closed.
    pub fn contains<T: Entity>(&self, handle: &EntityRef<T>) -> CoreResult<bool> {
        self.ensure_open()?;
        Ok(self
            .entries
            .resolve(handle.slot(), handle.stamp())
            .is_some_and(ManagedEntry::is_managed))
    }

    /// Returns the lifecycle state of the instance a handle refers to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidContextState` if the context is closed.
    pub fn state<T: Entity>(&self, handle: &EntityRef<T>) -> CoreResult<EntityState> {
        self.ensure_open()?;
        let state = match self.entries.resolve(handle.slot(), handle.stamp()) {
            Some(entry) if entry.is_managed() => EntityState::Managed,
            Some(_) => EntityState::Removed,
            None => EntityState::Detached,
        };
        Ok(state)
    }

    /// Detaches every instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidContextState` if the context is closed.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let detached = self.entries.clear();
        let pruned = if self.config.prune_detached_writes {
            self.queue.clear()
        } else {
            0
        };
        debug!(context = %self.id, detached, pruned, "context cleared");
        Ok(())
    }

    /// Closes the context. Closing twice is allowed.
    ///
    /// An active transaction is rolled back in the store.
    ///
    /// # Errors
    ///
    /// Never fails; the result matches the other operations.
    pub fn close(&mut self) -> CoreResult<()> {
        if !self.open {
            return Ok(());
        }

        if let Some(txn) = self.coordinator.finish() {
            if let Err(err) = self.store.rollback_durable() {
                warn!(context = %self.id, %txn, error = %err, "store rollback failed during close");
            }
            self.stats.record_rollback();
        }

        let discarded = self.queue.clear();
        self.entries.clear();
        self.open = false;
        debug!(context = %self.id, discarded, "context closed");
        Ok(())
    }

    /// Writes pending changes to the store.
    ///
    /// Runs dirty checking over managed instances, then applies queued and
    /// generated actions as one batch: inserts, then updates, then deletes.
    /// Returns the number of actions written.
    ///
    /// Outside a transaction (allowed by
    /// [`ContextConfig::require_transaction`]) the batch is committed in the
    /// store right away.
    ///
    /// On failure nothing changes in the context: the queue, the identity
    /// map and every snapshot stay as they were.
    ///
    /// # Errors
    ///
    /// - `TransactionRequired` if no transaction is active and the config
    ///   requires one
    /// - `StoreFailure` if the store rejects the batch
    pub fn flush(&mut self) -> CoreResult<usize> {
        self.ensure_open()?;
        let in_transaction = self.coordinator.is_active();
        if self.config.require_transaction && !in_transaction {
            return Err(CoreError::TransactionRequired);
        }

        let written = self.flush_batch()?;
        if !in_transaction && written > 0 {
            self.store.commit_durable()?;
            debug!(context = %self.id, written, "flush committed outside a transaction");
        }
        Ok(written)
    }

    pub(crate) fn flush_batch(&mut self) -> CoreResult<usize> {
        let generated = self.dirty_updates();
        let batch = self.queue.ordered_batch(generated);
        if batch.is_empty() {
            trace!(context = %self.id, "nothing to flush");
            return Ok(0);
        }

        self.store.apply(&batch)?;

        self.queue.clear();
        for action in &batch {
            self.synchronize(action);
        }
        self.stats.record_flush(&batch);
        debug!(context = %self.id, actions = batch.len(), "flushed");
        Ok(batch.len())
    }

    /// Builds an update for every managed instance that differs from its
    /// snapshot, in insertion order.
    fn dirty_updates(&self) -> Vec<WriteAction> {
        self.entries
            .in_insertion_order()
            .into_iter()
            .filter(|entry| entry.is_managed())
            .filter_map(|entry| {
                let changes = entry.snapshot.diff(&entry.record.current_row())?;
                Some(WriteAction::update(entry.key.clone(), changes))
            })
            .collect()
    }

    /// Brings the identity map in line with an action the store accepted.
    fn synchronize(&mut self, action: &WriteAction) {
        match action {
            WriteAction::Insert { key, row } => {
                if let Some((_, entry)) = self.entries.lookup_mut(key) {
                    entry.snapshot = Snapshot::new(row.clone());
                }
            }
            WriteAction::Update { key, changes } => {
                if let Some((_, entry)) = self.entries.lookup_mut(key) {
                    entry.snapshot = entry.snapshot.advanced(changes);
                }
            }
            WriteAction::Delete { key } => {
                self.entries.remove(key);
            }
        }
    }

    fn ensure_untracked(&self, key: &EntityKey) -> CoreResult<()> {
        match self.entries.lookup(key) {
            Some((_, entry)) if entry.is_managed() => {
                Err(CoreError::IdentityConflict { key: key.clone() })
            }
            Some(_) => Err(CoreError::EntityRemoved { key: key.clone() }),
            None => Ok(()),
        }
    }

    /// Returns the actions queued since the last flush.
    ///
    /// Updates from dirty checking are generated at flush time and do not
    /// appear here.
    #[must_use]
    pub fn pending_writes(&self) -> &[WriteAction] {
        self.queue.as_slice()
    }

    /// Returns the number of managed instances, removed ones excluded.
    #[must_use]
    pub fn managed_count(&self) -> usize {
        self.entries.managed_count()
    }

    /// Returns the statistics this context reports into.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

fn kind_mismatch<T: Entity>(key: EntityKey) -> CoreError {
    CoreError::KindMismatch {
        key,
        expected: type_name::<T>(),
    }
}

impl fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("id", &self.id)
            .field("open", &self.open)
            .field("tracked", &self.entries.len())
            .field("pending", &self.queue.len())
            .field("transaction", &self.coordinator.current())
            .finish_non_exhaustive()
    }
}
