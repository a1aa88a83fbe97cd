//! Query results.

use crate::error::{CoreError, CoreResult};
use crate::handle::Handle;
use crate::object::ObjectId;

/// Ordered identities matched by a query.
///
/// A result set is a snapshot: its members are fixed when the query runs.
/// Computed inside a write transaction it reflects that transaction's own
/// changes; computed outside, only committed state. Deleting through the
/// result set removes the member, so later positions shift down by one.
pub struct ResultSet<'h> {
    handle: &'h Handle,
    ids: Vec<ObjectId>,
}

impl<'h> ResultSet<'h> {
    pub(crate) fn new(handle: &'h Handle, ids: Vec<ObjectId>) -> Self {
        Self { handle, ids }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the query matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Member at `index`, or `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ObjectId> {
        self.ids.get(index).copied()
    }

    /// First member, or `None` if empty.
    #[must_use]
    pub fn first(&self) -> Option<ObjectId> {
        self.ids.first().copied()
    }

    /// Last member, or `None` if empty.
    #[must_use]
    pub fn last(&self) -> Option<ObjectId> {
        self.ids.last().copied()
    }

    /// Iterates over members in order.
    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids.iter().copied()
    }

    /// Members as a slice.
    #[must_use]
    pub fn ids(&self) -> &[ObjectId] {
        &self.ids
    }

    /// Deletes the object at `index` from the store and drops it from the
    /// result set.
    ///
    /// # Errors
    ///
    /// - `Transaction` outside a write transaction
    /// - `IndexOutOfBounds` past the end
    /// - `StaleIdentity` if the object was already deleted some other way
    pub fn delete_from_store(&mut self, index: usize) -> CoreResult<ObjectId> {
        self.handle.require_write("delete_from_store")?;
        let id = self.get(index).ok_or(CoreError::IndexOutOfBounds {
            index,
            len: self.ids.len(),
        })?;
        self.handle.delete(id)?;
        self.ids.remove(index);
        Ok(id)
    }

    /// Deletes every member still present in the store and empties the
    /// result set. Returns the number of objects deleted.
    pub fn delete_all_from_store(&mut self) -> CoreResult<usize> {
        self.handle.require_write("delete_all_from_store")?;
        let mut deleted = 0;
        for id in std::mem::take(&mut self.ids) {
            if self.handle.exists(id)? {
                self.handle.delete(id)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl<'a> IntoIterator for &'a ResultSet<'_> {
    type Item = ObjectId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, ObjectId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter().copied()
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("handle", &self.handle.id())
            .field("ids", &self.ids)
            .finish()
    }
}
