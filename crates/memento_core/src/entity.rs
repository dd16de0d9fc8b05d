//! Entity trait and managed-instance handles.

use crate::error::CoreResult;
use memento_store::{EntityId, EntityKey, Row};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A record type that a persistence context can manage.
///
/// Implementations map the record to and from a [`Row`]. `to_row` must
/// emit the same set of fields for every instance; dirty checking compares
/// rows field by field.
///
/// # Example
///
/// ```rust
/// use memento_core::{CoreError, CoreResult, Entity};
/// use memento_store::{EntityId, Row};
///
/// #[derive(Debug, Clone, PartialEq)]
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
/// ```
pub trait Entity: Clone + fmt::Debug + Send + 'static {
    /// Type tag shared by every record of this type.
    const KIND: &'static str;

    /// Returns the caller-assigned identifier.
    fn id(&self) -> EntityId;

    /// Returns the record's field values.
    fn to_row(&self) -> Row;

    /// Builds a record from a stored row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RowMapping`](crate::CoreError::RowMapping) if
    /// the row lacks a field or holds a value of the wrong type.
    fn from_row(id: EntityId, row: &Row) -> CoreResult<Self>;

    /// Returns the record identity.
    fn key(&self) -> EntityKey {
        EntityKey::new(Self::KIND, self.id())
    }
}

/// Builds the identity of a `T` record.
pub(crate) fn key_of<T: Entity>(id: EntityId) -> EntityKey {
    EntityKey::new(T::KIND, id)
}

/// Lifecycle state of a managed instance, as seen through its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Tracked and subject to dirty checking.
    Managed,
    /// Scheduled for deletion at the next flush.
    Removed,
    /// No longer tracked by the context.
    Detached,
}

/// Handle to a managed instance.
///
/// Handles are cheap to copy. Two handles are equal exactly when they
/// refer to the same instance; a handle outlives its instance as a
/// `Detached` reference and never aliases a later instance of the same
/// identity.
pub struct EntityRef<T> {
    slot: u32,
    stamp: u64,
    id: EntityId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityRef<T> {
    pub(crate) fn new(slot: u32, stamp: u64, id: EntityId) -> Self {
        Self {
            slot,
            stamp,
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Returns the identifier of the referenced record.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the identity of the referenced record.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        key_of::<T>(self.id)
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityRef<T> {}

impl<T> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.stamp == other.stamp
    }
}

impl<T> Eq for EntityRef<T> {}

impl<T> Hash for EntityRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.stamp.hash(state);
    }
}

impl<T: Entity> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({}#{} @{})", T::KIND, self.id, self.stamp)
    }
}

/// Type-erased view of a managed record.
pub(crate) trait ManagedRecord: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn current_row(&self) -> Row;
}

impl<T: Entity> ManagedRecord for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn current_row(&self) -> Row {
        self.to_row()
    }
}

impl fmt::Debug for dyn ManagedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ManagedRecord").field(&self.current_row()).finish()
    }
}
