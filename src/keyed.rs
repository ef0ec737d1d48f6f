//! Ordered keyed table.
//!
//! Rows are kept in key order. The two row policies the pipeline relies on
//! are explicit methods: [`KeyedTable::upsert`] (last seen wins) and
//! [`KeyedTable::retain_complete`] (drop rows missing a required column).

use std::collections::{BTreeMap, btree_map};

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedTable<K: Ord, V> {
    rows: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for KeyedTable<K, V> {
    fn default() -> Self {
        KeyedTable {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> KeyedTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `row`, replacing and returning any earlier row for `key`.
    pub fn upsert(&mut self, key: K, row: V) -> Option<V> {
        self.rows.insert(key, row)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, V> {
        self.rows.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, K, V> {
        self.rows.keys()
    }

    /// Keeps only rows for which `is_complete` holds; returns how many
    /// were dropped.
    pub fn retain_complete<F>(&mut self, mut is_complete: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|k, v| is_complete(k, v));
        before - self.rows.len()
    }
}

impl<K: Ord, V> IntoIterator for KeyedTable<K, V> {
    type Item = (K, V);
    type IntoIter = btree_map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a KeyedTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = btree_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for KeyedTable<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = KeyedTable::new();
        for (key, row) in iter {
            table.upsert(key, row);
        }
        table
    }
}
