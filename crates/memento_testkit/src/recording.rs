//! A store that records what contexts ask of it.
//!
//! `RecordingStore` wraps a [`MemoryStore`] and logs every load, applied
//! batch, commit and rollback across all of its connections. Tests use it
//! to check what a flush actually sent, and to inject store failures.

use memento_store::{
    DurableStore, EntityKey, MemoryStore, Row, StoreError, StoreProvider, StoreResult,
    WriteAction,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Everything a [`RecordingStore`] has observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    /// Keys passed to `load`, in call order.
    pub loads: Vec<EntityKey>,
    /// Batches accepted by `apply`, in call order.
    pub batches: Vec<Vec<WriteAction>>,
    /// Number of successful `commit_durable` calls.
    pub commits: usize,
    /// Number of `rollback_durable` calls.
    pub rollbacks: usize,
}

impl Recording {
    /// Returns every applied action, flattened.
    pub fn actions(&self) -> Vec<WriteAction> {
        self.batches.iter().flatten().cloned().collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_applies: usize,
    fail_commits: usize,
}

#[derive(Debug, Default)]
struct Log {
    recording: Recording,
    faults: Faults,
}

/// A store provider that records calls and can fail on demand.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    log: Arc<Mutex<Log>>,
}

impl RecordingStore {
    /// Creates a recording store over an empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording store over `inner`.
    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            log: Arc::default(),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Returns a copy of the recording so far.
    pub fn recording(&self) -> Recording {
        self.log.lock().recording.clone()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.log.lock().recording = Recording::default();
    }

    /// Makes the next `count` calls to `apply` fail without staging anything.
    pub fn fail_next_applies(&self, count: usize) {
        self.log.lock().faults.fail_applies = count;
    }

    /// Makes the next `count` calls to `commit_durable` fail.
    pub fn fail_next_commits(&self, count: usize) {
        self.log.lock().faults.fail_commits = count;
    }

    /// Returns the committed row under `key`.
    pub fn row(&self, key: &EntityKey) -> Option<Row> {
        self.inner.row(key)
    }
}

impl StoreProvider for RecordingStore {
    fn connect(&self) -> StoreResult<Box<dyn DurableStore>> {
        Ok(Box::new(RecordingConnection {
            inner: self.inner.connect()?,
            log: Arc::clone(&self.log),
        }))
    }
}

struct RecordingConnection {
    inner: Box<dyn DurableStore>,
    log: Arc<Mutex<Log>>,
}

impl DurableStore for RecordingConnection {
    fn load(&mut self, key: &EntityKey) -> StoreResult<Option<Row>> {
        self.log.lock().recording.loads.push(key.clone());
        self.inner.load(key)
    }

    fn apply(&mut self, actions: &[WriteAction]) -> StoreResult<()> {
        {
            let mut log = self.log.lock();
            if log.faults.fail_applies > 0 {
                log.faults.fail_applies -= 1;
                return Err(StoreError::rejected("injected apply failure"));
            }
        }

        self.inner.apply(actions)?;
        trace!(actions = actions.len(), "batch recorded");
        self.log.lock().recording.batches.push(actions.to_vec());
        Ok(())
    }

    fn commit_durable(&mut self) -> StoreResult<()> {
        {
            let mut log = self.log.lock();
            if log.faults.fail_commits > 0 {
                log.faults.fail_commits -= 1;
                return Err(StoreError::rejected("injected commit failure"));
            }
        }

        self.inner.commit_durable()?;
        self.log.lock().recording.commits += 1;
        Ok(())
    }

    fn rollback_durable(&mut self) -> StoreResult<()> {
        self.log.lock().recording.rollbacks += 1;
        self.inner.rollback_durable()
    }
}
