//! # Memento Store
//!
//! The durable-store side of Memento.
//!
//! A persistence context never talks to storage directly. It consumes a
//! store through the [`DurableStore`] contract:
//!
//! - `load(key)` - point lookup of one row
//! - `apply(actions)` - atomic-or-nothing application of an ordered batch
//! - `commit_durable()` / `rollback_durable()` - finalize or discard
//!   whatever `apply` staged
//!
//! This crate also owns the data model shared by both sides of that
//! boundary ([`EntityKey`], [`Row`], [`Value`], [`WriteAction`]) and ships
//! two reference stores:
//!
//! - [`MemoryStore`] - for tests and ephemeral data
//! - [`FileStore`] - committed batches are journaled to an append-only
//!   file and replayed on open
//!
//! ## Example
//!
//! ```rust
//! use memento_store::{DurableStore, EntityKey, MemoryStore, Row, StoreProvider, WriteAction};
//!
//! let store = MemoryStore::new();
//! let mut conn = store.connect().unwrap();
//!
//! let key = EntityKey::new("memo", 1);
//! let row = Row::new().with("username", "Robbie");
//! conn.apply(&[WriteAction::insert(key.clone(), row.clone())]).unwrap();
//! conn.commit_durable().unwrap();
//!
//! assert_eq!(store.row(&key), Some(row));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod connection;
mod error;
mod file;
mod key;
mod memory;
mod row;
mod store;
mod tables;
mod value;

pub use action::{ActionKind, WriteAction};
pub use connection::StoreConnection;
pub use error::{StoreError, StoreResult};
pub use file::{FileStore, FileStoreOptions};
pub use key::{EntityId, EntityKey};
pub use memory::MemoryStore;
pub use row::Row;
pub use store::{DurableStore, StoreProvider};
pub use value::Value;
