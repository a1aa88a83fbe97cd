//! The full set of tables as one consistent version.

use crate::error::{CoreError, CoreResult};
use crate::log::{CommitRecord, LogOp};
use crate::object::{Cell, ObjectKey, Table};
use crate::schema::{FieldType, Schema};
use crate::types::TypeId;

/// One version of every table.
///
/// The committed version is shared behind an `Arc`; a write transaction
/// works on a private clone and publishes it on commit.
#[derive(Debug, Clone)]
pub(crate) struct StoreState {
    tables: Vec<Table>,
}

impl StoreState {
    /// Creates empty tables for every registered type.
    pub(crate) fn new(schema: &Schema) -> Self {
        Self {
            tables: vec![Table::default(); schema.len()],
        }
    }

    pub(crate) fn table(&self, type_id: TypeId) -> &Table {
        &self.tables[type_id.index()]
    }

    pub(crate) fn row(&self, object: ObjectKey) -> Option<&Vec<Cell>> {
        self.tables.get(object.type_id().index())?.get(object.key)
    }

    pub(crate) fn row_mut(&mut self, object: ObjectKey) -> Option<&mut Vec<Cell>> {
        self.tables
            .get_mut(object.type_id().index())?
            .get_mut(object.key)
    }

    pub(crate) fn contains(&self, object: ObjectKey) -> bool {
        self.tables
            .get(object.type_id().index())
            .is_some_and(|t| t.contains(object.key))
    }

    /// Allocates an object with zero values in every field.
    pub(crate) fn create(&mut self, schema: &Schema, type_id: TypeId) -> ObjectKey {
        let row = schema
            .field_types(type_id)
            .iter()
            .map(|t| Cell::default_for(*t))
            .collect();
        let key = self.tables[type_id.index()].insert(row);
        ObjectKey::new(type_id, key)
    }

    /// Removes `target` and scrubs every reference to it.
    ///
    /// Single references to the target become null and collection entries
    /// pointing at it are dropped. Returns the objects whose fields changed,
    /// or `None` if the target does not exist.
    pub(crate) fn remove(&mut self, schema: &Schema, target: ObjectKey) -> Option<Vec<ObjectKey>> {
        self.tables
            .get_mut(target.type_id().index())?
            .remove(target.key)?;

        let mut touched = Vec::new();
        for (type_id, _) in schema.entities() {
            let referencing: Vec<usize> = schema
                .field_types(type_id)
                .iter()
                .enumerate()
                .filter_map(|(i, t)| match t {
                    FieldType::Link(to) | FieldType::List(to) if *to == target.type_id() => {
                        Some(i)
                    }
                    _ => None,
                })
                .collect();
            if referencing.is_empty() {
                continue;
            }

            for (key, row) in self.tables[type_id.index()].iter_mut() {
                let mut changed = false;
                for &i in &referencing {
                    match &mut row[i] {
                        Cell::Link(slot) if *slot == Some(target.key) => {
                            *slot = None;
                            changed = true;
                        }
                        Cell::List(keys) => {
                            let before = keys.len();
                            keys.retain(|k| *k != target.key);
                            changed |= keys.len() != before;
                        }
                        _ => {}
                    }
                }
                if changed {
                    touched.push(ObjectKey::new(type_id, key));
                }
            }
        }
        Some(touched)
    }

    /// Per-type key counters, persisted so keys are never reused after reopen.
    pub(crate) fn next_keys(&self) -> Vec<u64> {
        self.tables.iter().map(Table::next_key).collect()
    }

    /// Raises the per-type key counters to at least `next_keys`.
    pub(crate) fn reserve_keys(&mut self, next_keys: &[u64]) {
        for (table, next) in self.tables.iter_mut().zip(next_keys) {
            table.reserve_keys_up_to(*next);
        }
    }

    /// Replays one committed record.
    pub(crate) fn apply(&mut self, schema: &Schema, record: &CommitRecord) -> CoreResult<()> {
        for op in &record.ops {
            match op {
                LogOp::Put { object, cells } => {
                    let type_id = self.checked_type(object.type_id())?;
                    let types = schema.field_types(type_id);
                    let well_formed = cells.len() == types.len()
                        && cells.iter().zip(types).all(|(c, t)| c.matches(*t));
                    if !well_formed {
                        return Err(CoreError::log_corruption(format!(
                            "row image for {}#{} does not match schema",
                            object.type_id, object.key
                        )));
                    }
                    self.tables[type_id.index()].put(object.key, cells.clone());
                }
                LogOp::Remove { object } => {
                    let type_id = self.checked_type(object.type_id())?;
                    self.tables[type_id.index()].remove(object.key);
                }
            }
        }

        self.reserve_keys(&record.next_keys);
        Ok(())
    }

    fn checked_type(&self, type_id: TypeId) -> CoreResult<TypeId> {
        if type_id.index() < self.tables.len() {
            Ok(type_id)
        } else {
            Err(CoreError::log_corruption(format!(
                "record references unknown {type_id}"
            )))
        }
    }
}
