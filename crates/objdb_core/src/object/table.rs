//! Per-type object table.

use crate::object::Cell;
use std::collections::BTreeMap;

/// Live rows of one entity type, keyed by allocation order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    rows: BTreeMap<u64, Vec<Cell>>,
    next_key: u64,
}

impl Table {
    /// Inserts a new row and returns its key.
    pub(crate) fn insert(&mut self, row: Vec<Cell>) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.rows.insert(key, row);
        key
    }

    /// Writes a row image under an existing key (recovery replay).
    pub(crate) fn put(&mut self, key: u64, row: Vec<Cell>) {
        self.next_key = self.next_key.max(key + 1);
        self.rows.insert(key, row);
    }

    pub(crate) fn get(&self, key: u64) -> Option<&Vec<Cell>> {
        self.rows.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: u64) -> Option<&mut Vec<Cell>> {
        self.rows.get_mut(&key)
    }

    pub(crate) fn remove(&mut self, key: u64) -> Option<Vec<Cell>> {
        self.rows.remove(&key)
    }

    pub(crate) fn contains(&self, key: u64) -> bool {
        self.rows.contains_key(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows in store iteration order (insertion order).
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &Vec<Cell>)> {
        self.rows.iter().map(|(k, v)| (*k, v))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u64, &mut Vec<Cell>)> {
        self.rows.iter_mut().map(|(k, v)| (*k, v))
    }

    pub(crate) fn keys(&self) -> Vec<u64> {
        self.rows.keys().copied().collect()
    }

    pub(crate) fn next_key(&self) -> u64 {
        self.next_key
    }

    pub(crate) fn reserve_keys_up_to(&mut self, next_key: u64) {
        self.next_key = self.next_key.max(next_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_never_reused() {
        let mut table = Table::default();
        let a = table.insert(vec![Cell::Int(1)]);
        let b = table.insert(vec![Cell::Int(2)]);
        table.remove(b);
        let c = table.insert(vec![Cell::Int(3)]);
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn iteration_follows_insertion() {
        let mut table = Table::default();
        for n in 0..5 {
            table.insert(vec![Cell::Int(n)]);
        }
        table.remove(2);
        let keys: Vec<u64> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 1, 3, 4]);
    }

    #[test]
    fn put_advances_counter() {
        let mut table = Table::default();
        table.put(7, vec![Cell::Int(0)]);
        assert_eq!(table.next_key(), 8);
        table.reserve_keys_up_to(3);
        assert_eq!(table.next_key(), 8);
        assert_eq!(table.insert(Vec::new()), 8);
    }
}
