//! # Memento Core
//!
//! A transactional persistence context: an in-memory session that tracks
//! records loaded from or saved to a durable store.
//!
//! - **Identity map**: at most one managed instance per record identity;
//!   repeated lookups return the same instance without asking the store
//! - **Lifecycle**: records are transient, managed, removed or detached
//! - **Write-behind queue**: saves and removals are deferred until flush
//! - **Dirty checking**: changed fields of managed records are written
//!   without an explicit update call
//! - **Merge**: values of an untracked record are reattached onto a
//!   managed instance, which becomes an insert or an update
//!
//! The store is reached only through [`DurableStore`](memento_store::DurableStore).
//!
//! ## Example
//!
//! ```rust
//! use memento_core::{ContextConfig, ContextFactory, CoreError, CoreResult, Entity};
//! use memento_store::{EntityId, MemoryStore, Row};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone)]
//! struct Memo {
//!     id: i64,
//!     contents: String,
//! }
//!
//! impl Entity for Memo {
//!     const KIND: &'static str = "memo";
//!
//!     fn id(&self) -> EntityId {
//!         EntityId::new(self.id)
//!     }
//!
//!     fn to_row(&self) -> Row {
//!         Row::new().with("contents", self.contents.as_str())
//!     }
//!
//!     fn from_row(id: EntityId, row: &Row) -> CoreResult<Self> {
//!         let contents = row
//!             .text("contents")
//!             .ok_or_else(|| CoreError::missing_field(Self::KIND, "contents"))?;
//!         Ok(Self { id: id.as_i64(), contents: contents.to_string() })
//!     }
//! }
//!
//! let factory = ContextFactory::new(Arc::new(MemoryStore::new()), ContextConfig::default());
//!
//! let mut ctx = factory.create_context().unwrap();
//! ctx.transaction(|ctx| ctx.save(Memo { id: 1, contents: "hello".into() }))
//!     .unwrap();
//! ctx.close().unwrap();
//!
//! let mut ctx = factory.create_context().unwrap();
//! let memo = ctx.find::<Memo>(1).unwrap().unwrap();
//! assert_eq!(ctx.get(&memo).unwrap().contents, "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod entity;
mod error;
mod factory;
mod identity_map;
mod queue;
mod snapshot;
mod stats;
mod transaction;
mod types;

#[cfg(test)]
mod testing;

pub use config::ContextConfig;
pub use context::PersistenceContext;
pub use entity::{Entity, EntityRef, EntityState};
pub use error::{CoreError, CoreResult};
pub use factory::ContextFactory;
pub use stats::{SessionStats, StatsSnapshot};
pub use types::{ContextId, TransactionId};

// Re-export the data model shared with stores
pub use memento_store::{ActionKind, EntityId, EntityKey, Row, Value, WriteAction};
