//! Working state of an open write transaction.

use crate::object::{ObjectKey, StoreState};
use std::collections::BTreeSet;

/// A private copy of the committed tables plus a record of what changed.
///
/// Rolling back is dropping this value.
#[derive(Debug)]
pub(crate) struct WriteState {
    pub(crate) working: StoreState,
    touched: BTreeSet<ObjectKey>,
    removed: BTreeSet<ObjectKey>,
}

impl WriteState {
    pub(crate) fn new(working: StoreState) -> Self {
        Self {
            working,
            touched: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Marks an object as created or modified.
    pub(crate) fn touch(&mut self, object: ObjectKey) {
        self.touched.insert(object);
    }

    /// Marks an object as deleted.
    pub(crate) fn remove(&mut self, object: ObjectKey) {
        self.touched.remove(&object);
        self.removed.insert(object);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.removed.is_empty()
    }

    /// Objects to write as full row images.
    pub(crate) fn touched(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.touched.iter().copied()
    }

    pub(crate) fn removed(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.removed.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySchema, FieldDef, Schema};
    use crate::types::TypeId;

    #[test]
    fn remove_supersedes_touch() {
        let schema = Schema::from_entities([EntitySchema::new("Cat").field(FieldDef::int("age"))])
            .unwrap();
        let mut state = WriteState::new(StoreState::new(&schema));
        assert!(state.is_empty());

        let a = ObjectKey::new(TypeId::new(0), 0);
        let b = ObjectKey::new(TypeId::new(0), 1);
        state.touch(a);
        state.touch(b);
        state.remove(a);

        assert_eq!(state.touched().collect::<Vec<_>>(), vec![b]);
        assert_eq!(state.removed().collect::<Vec<_>>(), vec![a]);
    }
}
