//! Object identities.

use crate::types::{HandleId, TypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle-independent address of an object: its type and table key.
///
/// Keys are allocated from a per-type counter and never reused, so a key
/// ordering is also an insertion ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) struct ObjectKey {
    pub(crate) type_id: u32,
    pub(crate) key: u64,
}

impl ObjectKey {
    pub(crate) fn new(type_id: TypeId, key: u64) -> Self {
        Self {
            type_id: type_id.0,
            key,
        }
    }

    pub(crate) fn type_id(self) -> TypeId {
        TypeId::new(self.type_id)
    }
}

/// Opaque identity of a live object, bound to the handle that produced it.
///
/// An `ObjectId` stays valid across field mutations and commits for as long
/// as the object is not deleted. It may only be used with the [`Handle`]
/// that returned it; other handles must re-resolve it with
/// [`Handle::resolve`].
///
/// [`Handle`]: crate::Handle
/// [`Handle::resolve`]: crate::Handle::resolve
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub(crate) object: ObjectKey,
    pub(crate) handle: HandleId,
}

impl ObjectId {
    pub(crate) fn new(object: ObjectKey, handle: HandleId) -> Self {
        Self { object, handle }
    }

    /// Entity type of the object.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.object.type_id()
    }

    /// Table key of the object. Unique within its type.
    #[must_use]
    pub fn key(&self) -> u64 {
        self.object.key
    }

    /// Handle this identity is bound to.
    #[must_use]
    pub fn handle(&self) -> HandleId {
        self.handle
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectId({}#{} via {})",
            self.object.type_id, self.object.key, self.handle
        )
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object.type_id, self.object.key)
    }
}
