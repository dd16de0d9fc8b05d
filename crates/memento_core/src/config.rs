//! Context configuration.

/// Configuration for persistence contexts.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Whether `flush` requires an active transaction.
    pub require_transaction: bool,

    /// Whether `detach` and `clear` also drop queued writes for the
    /// identities they detach.
    pub prune_detached_writes: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            require_transaction: true,
            prune_detached_writes: false,
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether `flush` requires an active transaction.
    #[must_use]
    pub const fn require_transaction(mut self, value: bool) -> Self {
        self.require_transaction = value;
        self
    }

    /// Sets whether detaching drops queued writes.
    #[must_use]
    pub const fn prune_detached_writes(mut self, value: bool) -> Self {
        self.prune_detached_writes = value;
        self
    }
}
