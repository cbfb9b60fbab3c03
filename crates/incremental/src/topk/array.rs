//! Sorted-vector top-K index.

use super::window::{self, SortedStore, Window};
use super::{Comparator, IndexedValue, Limit, TopK, TopKChanges, TopKMoveChanges, WindowUpdate};
use alloc::vec::Vec;
use rivulet_core::Result;

impl<E> SortedStore<E> for Vec<IndexedValue<E>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, pos: usize) -> Option<&IndexedValue<E>> {
        self.as_slice().get(pos)
    }

    fn partition_point<P: FnMut(&E) -> bool>(&self, mut pred: P) -> usize {
        self.as_slice().partition_point(|v| pred(&v.value))
    }

    fn insert_at(&mut self, pos: usize, value: IndexedValue<E>) {
        self.insert(pos, value);
    }

    fn remove_at(&mut self, pos: usize) -> IndexedValue<E> {
        self.remove(pos)
    }
}

/// A top-K index over a sorted vector.
///
/// Inserts and deletes shift the tail of the vector, so both are O(n) in the
/// number of stored elements. Window moves are O(k).
pub struct TopKArray<E> {
    sorted: Vec<IndexedValue<E>>,
    window: Window,
    comparator: Comparator<E>,
}

impl<E> TopKArray<E> {
    pub fn new(offset: usize, limit: Limit, comparator: Comparator<E>) -> Self {
        Self {
            sorted: Vec::new(),
            window: Window::new(offset, limit),
            comparator,
        }
    }

    pub fn offset(&self) -> usize {
        self.window.start
    }

    pub fn limit(&self) -> Limit {
        self.window.limit()
    }

    /// Stored elements in sorted order.
    pub fn iter(&self) -> core::slice::Iter<'_, IndexedValue<E>> {
        self.sorted.iter()
    }
}

impl<E: Clone + Send> TopK<E> for TopKArray<E> {
    fn size(&self) -> usize {
        self.window.size(self.sorted.len())
    }

    fn len(&self) -> usize {
        self.sorted.len()
    }

    fn insert(&mut self, value: E) -> Result<TopKChanges<E>> {
        self.window.insert(&mut self.sorted, &self.comparator, value)
    }

    fn delete(&mut self, value: &E) -> Result<TopKChanges<E>> {
        self.window.delete(&mut self.sorted, &self.comparator, value)
    }

    fn move_window(&mut self, update: WindowUpdate) -> Result<TopKMoveChanges<E>> {
        Ok(self.window.shift(&self.sorted, update))
    }

    fn to_vec(&self) -> Vec<IndexedValue<E>> {
        self.sorted.clone()
    }

    fn visible(&self) -> Vec<IndexedValue<E>> {
        window::visible(&self.window, &self.sorted)
    }
}
