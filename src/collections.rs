//! Collections

use std::marker::PhantomData;

/// Integer-keyed storage with O(1) insert, lookup and removal and densely packed values
///
/// Keys are any handle type that converts to and from `usize`, so a `SparseSet<SourceId, T>`
/// can't be indexed with a `MacroId` by accident.
#[derive(Debug, Clone)]
pub struct SparseSet<K, T> {
    sparse: Vec<usize>,
    dense: Vec<usize>,
    data: Vec<T>,
    _key: PhantomData<K>,
}

const EMPTY_KEY: usize = usize::MAX;

impl<K, T> Default for SparseSet<K, T> {
    fn default() -> Self {
        SparseSet {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
            _key: PhantomData,
        }
    }
}

impl<K, T> SparseSet<K, T> where K: Copy + Into<usize> + From<usize> {
    pub fn new() -> SparseSet<K, T> {
        Self::default()
    }

    /// Returns true if the `SparseSet` contains an item for `key`
    pub fn contains(&self, key: K) -> bool {
        self.get_idx(key.into()).is_some()
    }

    /// Inserts the item with the given key, if there is already a stored item associated with the key, returns Some(stored)
    ///
    /// Returns None if there wasn't
    pub fn insert_with(&mut self, key: K, item: T) -> Option<T> {
        let raw: usize = key.into();
        if raw >= self.sparse.len() {
            self.sparse.resize(raw + 1, EMPTY_KEY);
        }

        if let Some(stored) = self.get_mut(key) {
            Some(std::mem::replace(stored, item))
        } else {
            self.sparse[raw] = self.dense.len();
            self.dense.push(raw);
            self.data.push(item);
            None
        }
    }

    pub fn remove(&mut self, key: K) -> Option<T> {
        let raw: usize = key.into();
        let idx = self.get_idx(raw)?;

        self.dense.swap_remove(idx);
        let item = self.data.swap_remove(idx);

        // the previously last item now lives where the removed one was
        if let Some(moved) = self.dense.get(idx) {
            self.sparse[*moved] = idx;
        }
        self.sparse[raw] = EMPTY_KEY;

        Some(item)
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.get_idx(key.into()).map(|idx| &self.data[idx])
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        match self.get_idx(key.into()) {
            Some(idx) => Some(&mut self.data[idx]),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in ascending order. Dense storage order is not stable across removals, this is
    pub fn sorted_keys(&self) -> Vec<K> {
        let mut keys = self.dense.clone();
        keys.sort_unstable();
        keys.into_iter().map(K::from).collect()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    fn get_idx(&self, key: usize) -> Option<usize> {
        let idx = *self.sparse.get(key)?;
        if idx < self.dense.len() && self.dense[idx] == key {
            Some(idx)
        } else {
            None
        }
    }
}
