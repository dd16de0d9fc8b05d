//! Context factory.

use crate::config::ContextConfig;
use crate::context::PersistenceContext;
use crate::error::{CoreError, CoreResult};
use crate::stats::{SessionStats, StatsSnapshot};
use memento_store::StoreProvider;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Creates persistence contexts over one store.
///
/// The factory is thread-safe and meant to be shared; the contexts it
/// creates are not. Each context gets its own store connection, identity
/// map and queue, so nothing cached in one context is visible in another.
///
/// # Example
///
/// ```rust
/// use memento_core::{ContextConfig, ContextFactory};
/// use memento_store::MemoryStore;
/// use std::sync::Arc;
///
/// let factory = ContextFactory::new(Arc::new(MemoryStore::new()), ContextConfig::default());
/// let mut ctx = factory.create_context().unwrap();
/// ctx.close().unwrap();
///
/// factory.close();
/// assert!(factory.create_context().is_err());
/// ```
pub struct ContextFactory {
    provider: Arc<dyn StoreProvider>,
    config: ContextConfig,
    stats: Arc<SessionStats>,
    open: AtomicBool,
    created: AtomicU64,
}

impl ContextFactory {
    /// Creates a factory over a store provider.
    #[must_use]
    pub fn new(provider: Arc<dyn StoreProvider>, config: ContextConfig) -> Self {
        Self {
            provider,
            config,
            stats: Arc::new(SessionStats::new()),
            open: AtomicBool::new(true),
            created: AtomicU64::new(0),
        }
    }

    /// Creates a context with its own store connection.
    ///
    /// # Errors
    ///
    /// Returns `FactoryClosed` after [`close`](Self::close), or
    /// `StoreFailure` if the store refuses a connection.
    pub fn create_context(&self) -> CoreResult<PersistenceContext> {
        if !self.is_open() {
            return Err(CoreError::FactoryClosed);
        }

        let store = self.provider.connect()?;
        let ctx = PersistenceContext::with_stats(store, self.config.clone(), Arc::clone(&self.stats));
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(context = %ctx.id(), "context created by factory");
        Ok(ctx)
    }

    /// Closes the factory. Contexts already created stay usable.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(created = self.contexts_created(), "context factory closed");
        }
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Returns the configuration given to new contexts.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the number of contexts created so far.
    #[must_use]
    pub fn contexts_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns statistics summed over every context of this factory.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("created", &self.contexts_created())
            .finish_non_exhaustive()
    }
}
