//! Session statistics.
//!
//! Counters shared by every context created from one factory. They make
//! the cache behavior observable: a second `find` of a managed identity
//! shows up as a cache hit, not as another load.
//!
//! # Usage
//!
//! ```rust
//! use memento_core::{ContextConfig, ContextFactory};
//! use memento_store::MemoryStore;
//! use std::sync::Arc;
//!
//! let factory = ContextFactory::new(Arc::new(MemoryStore::new()), ContextConfig::default());
//! let _ctx = factory.create_context().unwrap();
//!
//! let stats = factory.stats();
//! assert_eq!(stats.loads, 0);
//! assert_eq!(stats.transactions_begun, 0);
//! ```

use memento_store::{ActionKind, WriteAction};
use std::sync::atomic::{AtomicU64, Ordering};

/// Persistence context statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Rows requested from the store.
    loads: AtomicU64,
    /// `find` calls answered from the identity map.
    cache_hits: AtomicU64,
    /// Non-empty batches applied to the store.
    flushes: AtomicU64,

    // Actions written, by kind
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,

    // Transaction counters
    transactions_begun: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
}

impl SessionStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successfully applied batch.
    pub(crate) fn record_flush(&self, batch: &[WriteAction]) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        for action in batch {
            let counter = match action.kind() {
                ActionKind::Insert => &self.inserts,
                ActionKind::Update => &self.updates,
                ActionKind::Delete => &self.deletes,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_begin(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of rows requested from the store.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Returns the number of `find` calls served from the identity map.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of batches applied to the store.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            loads: self.loads(),
            cache_hits: self.cache_hits(),
            flushes: self.flushes(),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of session statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Rows requested from the store.
    pub loads: u64,
    /// `find` calls answered from the identity map.
    pub cache_hits: u64,
    /// Batches applied to the store.
    pub flushes: u64,
    /// Insert actions written.
    pub inserts: u64,
    /// Update actions written.
    pub updates: u64,
    /// Delete actions written.
    pub deletes: u64,
    /// Transactions begun.
    pub transactions_begun: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
}
