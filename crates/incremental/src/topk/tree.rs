//! Leaf-chunked top-K index.

use super::window::{self, SortedStore, Window};
use super::{Comparator, IndexedValue, Limit, TopK, TopKChanges, TopKMoveChanges, WindowUpdate};
use alloc::vec::Vec;
use rivulet_core::{Error, Result};

/// Maximum number of elements per leaf before it splits.
pub const DEFAULT_ORDER: usize = 64;

/// Sorted leaves; every leaf is non-empty and holds at most `order` elements.
///
/// `starts[i]` is the global position of the first element of leaf `i`, so
/// positional lookups binary-search the leaf instead of summing lengths.
struct Leaves<E> {
    leaves: Vec<Vec<IndexedValue<E>>>,
    starts: Vec<usize>,
    len: usize,
    order: usize,
}

impl<E> Leaves<E> {
    fn new(order: usize) -> Self {
        Self {
            leaves: Vec::new(),
            starts: Vec::new(),
            len: 0,
            order: order.max(2),
        }
    }

    /// Maps a global position to (leaf, slot).
    fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        if pos >= self.len {
            return None;
        }
        let leaf_id = self.starts.partition_point(|&start| start <= pos) - 1;
        Some((leaf_id, pos - self.starts[leaf_id]))
    }

    fn shift_starts_after(&mut self, leaf_id: usize, grow: bool) {
        for start in &mut self.starts[leaf_id + 1..] {
            if grow {
                *start += 1;
            } else {
                *start -= 1;
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = &IndexedValue<E>> {
        self.leaves.iter().flatten()
    }
}

impl<E> SortedStore<E> for Leaves<E> {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, pos: usize) -> Option<&IndexedValue<E>> {
        let (leaf, slot) = self.locate(pos)?;
        self.leaves[leaf].get(slot)
    }

    fn partition_point<P: FnMut(&E) -> bool>(&self, mut pred: P) -> usize {
        // first leaf whose last element fails the predicate
        let leaf_id = self
            .leaves
            .as_slice()
            .partition_point(|leaf| leaf.last().map_or(true, |v| pred(&v.value)));
        match self.leaves.get(leaf_id) {
            Some(leaf) => self.starts[leaf_id] + leaf.as_slice().partition_point(|v| pred(&v.value)),
            None => self.len,
        }
    }

    fn insert_at(&mut self, pos: usize, value: IndexedValue<E>) {
        let (leaf_id, slot) = match self.locate(pos) {
            Some(found) => found,
            None => match self.leaves.len() {
                0 => {
                    self.leaves.push(Vec::with_capacity(self.order));
                    self.starts.push(0);
                    (0, 0)
                }
                n => (n - 1, self.leaves[n - 1].len()),
            },
        };
        let leaf = &mut self.leaves[leaf_id];
        leaf.insert(slot, value);
        if leaf.len() > self.order {
            let right = leaf.split_off(leaf.len() / 2);
            let right_start = self.starts[leaf_id] + leaf.len();
            self.leaves.insert(leaf_id + 1, right);
            self.starts.insert(leaf_id + 1, right_start);
            self.shift_starts_after(leaf_id + 1, true);
        } else {
            self.shift_starts_after(leaf_id, true);
        }
        self.len += 1;
    }

    fn remove_at(&mut self, pos: usize) -> IndexedValue<E> {
        let (leaf_id, slot) = self
            .locate(pos)
            .unwrap_or_else(|| panic!("position {pos} out of bounds (len {})", self.len));
        let removed = self.leaves[leaf_id].remove(slot);
        self.shift_starts_after(leaf_id, false);
        if self.leaves[leaf_id].is_empty() {
            self.leaves.remove(leaf_id);
            self.starts.remove(leaf_id);
        }
        self.len -= 1;
        removed
    }
}

/// A top-K index over sorted leaves of bounded size.
///
/// Inserts and deletes only shift elements inside one leaf. The window is
/// fixed at construction: `move_window` fails with
/// `Error::UnsupportedOperation`.
pub struct TopKTree<E> {
    leaves: Leaves<E>,
    window: Window,
    comparator: Comparator<E>,
}

impl<E> TopKTree<E> {
    pub fn new(offset: usize, limit: Limit, comparator: Comparator<E>) -> Self {
        Self::with_order(DEFAULT_ORDER, offset, limit, comparator)
    }

    pub fn with_order(order: usize, offset: usize, limit: Limit, comparator: Comparator<E>) -> Self {
        Self {
            leaves: Leaves::new(order),
            window: Window::new(offset, limit),
            comparator,
        }
    }

    /// Number of leaves currently allocated.
    pub fn leaf_count(&self) -> usize {
        self.leaves.leaves.len()
    }

    /// Stored elements in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedValue<E>> {
        self.leaves.iter()
    }
}

impl<E: Clone + Send> TopK<E> for TopKTree<E> {
    fn size(&self) -> usize {
        self.window.size(self.leaves.len)
    }

    fn len(&self) -> usize {
        self.leaves.len
    }

    fn insert(&mut self, value: E) -> Result<TopKChanges<E>> {
        self.window.insert(&mut self.leaves, &self.comparator, value)
    }

    fn delete(&mut self, value: &E) -> Result<TopKChanges<E>> {
        self.window.delete(&mut self.leaves, &self.comparator, value)
    }

    fn move_window(&mut self, _update: WindowUpdate) -> Result<TopKMoveChanges<E>> {
        Err(Error::unsupported_operation("move", "tree"))
    }

    fn to_vec(&self) -> Vec<IndexedValue<E>> {
        self.leaves.iter().cloned().collect()
    }

    fn visible(&self) -> Vec<IndexedValue<E>> {
        window::visible(&self.window, &self.leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topk::TopKArray;
    use alloc::sync::Arc;
    use alloc::vec;

    fn cmp() -> Comparator<i32> {
        Arc::new(|a: &i32, b: &i32| a.cmp(b))
    }

    fn values(items: &[IndexedValue<i32>]) -> Vec<i32> {
        items.iter().map(|v| v.value).collect()
    }

    #[test]
    fn test_leaves_split_and_merge() {
        let mut tree = TopKTree::with_order(4, 0, Limit::Unbounded, cmp());
        for v in 0..20 {
            tree.insert(v).unwrap();
        }
        assert!(tree.leaf_count() > 1);
        assert_eq!(values(&tree.to_vec()), (0..20).collect::<Vec<_>>());

        for v in 0..20 {
            tree.delete(&v).unwrap();
        }
        assert!(tree.is_empty());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_positions_consistent_across_splits() {
        let mut tree = TopKTree::with_order(3, 0, Limit::Unbounded, cmp());
        for v in (0..40).rev() {
            tree.insert(v * 2).unwrap();
        }
        for v in [7, 13, 41] {
            tree.insert(v).unwrap();
        }
        for v in [0, 20, 78] {
            tree.delete(&v).unwrap();
        }

        let expected: Vec<i32> = tree.iter().map(|v| v.value).collect();
        assert_eq!(expected.len(), 40);
        for (pos, value) in expected.iter().enumerate() {
            assert_eq!(tree.leaves.get(pos).map(|v| v.value), Some(*value));
        }
        assert!(tree.leaves.get(expected.len()).is_none());
        assert_eq!(
            tree.leaves.partition_point(|e| *e < 41),
            expected.iter().filter(|v| **v < 41).count()
        );
    }

    #[test]
    fn test_matches_array_changes() {
        let order = [7, 3, 9, 1, 5, 8, 2, 6, 4, 0];
        let mut tree = TopKTree::with_order(3, 2, Limit::Bounded(3), cmp());
        let mut array = TopKArray::new(2, Limit::Bounded(3), cmp());

        for v in order {
            assert_eq!(tree.insert(v).unwrap(), array.insert(v).unwrap());
        }
        assert_eq!(tree.visible(), array.visible());
        assert_eq!(values(&tree.visible()), vec![2, 3, 4]);

        for v in [3, 0, 9, 5] {
            assert_eq!(tree.delete(&v).unwrap(), array.delete(&v).unwrap());
        }
        assert_eq!(tree.to_vec(), array.to_vec());
    }

    #[test]
    fn test_move_window_unsupported() {
        let mut tree = TopKTree::new(0, Limit::Bounded(2), cmp());
        tree.insert(1).unwrap();
        assert_eq!(
            tree.move_window(WindowUpdate::new().with_offset(1)),
            Err(Error::unsupported_operation("move", "tree"))
        );
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_delete_missing() {
        let mut tree = TopKTree::new(0, Limit::Unbounded, cmp());
        assert_eq!(tree.delete(&1), Err(Error::MissingElement));
    }
}
