//! # Memento Testkit
//!
//! Test utilities for Memento.
//!
//! This crate provides:
//! - The `Memo` test entity and factory fixtures over memory and file stores
//! - A recording store that captures every batch and can inject failures
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use memento_testkit::prelude::*;
//!
//! with_memory_factory(|fixture| {
//!     let mut ctx = fixture.create_context().unwrap();
//!     ctx.transaction(|ctx| ctx.save(Memo::new(1, "Robbie", "hello")))
//!         .unwrap();
//!     assert_eq!(fixture.len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod recording;

#[cfg(test)]
mod properties;
#[cfg(test)]
mod scenarios;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use recording::*;
