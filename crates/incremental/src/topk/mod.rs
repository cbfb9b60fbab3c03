//! Ordered windows over sorted collections.
//!
//! A top-K index keeps every candidate element sorted and exposes the slice
//! `[offset, offset + limit)` as the visible window. Each insert or delete
//! reports the (at most one) element entering and the (at most one) element
//! leaving the window; each element carries a fractional index assigned when
//! it was inserted, so consumers can keep visible elements ordered without
//! renumbering.

mod array;
mod state;
mod tree;
mod window;

pub use array::TopKArray;
pub use state::{Ranked, TopKState};
pub use tree::TopKTree;

pub use crate::fractional::FractionalIndex;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use rivulet_core::Result;

/// Shared comparison function over index elements.
pub type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

/// An element paired with its order key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedValue<E> {
    pub value: E,
    pub index: FractionalIndex,
}

impl<E> IndexedValue<E> {
    pub fn new(value: E, index: FractionalIndex) -> Self {
        Self { value, index }
    }

    pub fn into_parts(self) -> (E, FractionalIndex) {
        (self.value, self.index)
    }
}

/// Window changes caused by one insert or delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopKChanges<E> {
    /// Element entering the window
    pub move_in: Option<IndexedValue<E>>,
    /// Element leaving the window
    pub move_out: Option<IndexedValue<E>>,
}

impl<E> Default for TopKChanges<E> {
    fn default() -> Self {
        Self {
            move_in: None,
            move_out: None,
        }
    }
}

/// Window changes caused by moving the window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopKMoveChanges<E> {
    pub move_ins: Vec<IndexedValue<E>>,
    pub move_outs: Vec<IndexedValue<E>>,
    /// True if the visible range changed, even when no stored element moved
    pub changes: bool,
}

impl<E> Default for TopKMoveChanges<E> {
    fn default() -> Self {
        Self {
            move_ins: Vec::new(),
            move_outs: Vec::new(),
            changes: false,
        }
    }
}

/// Maximum number of visible elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Limit {
    Bounded(usize),
    #[default]
    Unbounded,
}

impl Limit {
    /// Exclusive end of a window starting at `offset`, `None` if unbounded.
    pub fn end(self, offset: usize) -> Option<usize> {
        match self {
            Limit::Bounded(n) => Some(offset.saturating_add(n)),
            Limit::Unbounded => None,
        }
    }
}

impl From<usize> for Limit {
    fn from(n: usize) -> Self {
        Limit::Bounded(n)
    }
}

/// Which sorted structure backs a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Sorted vector; supports moving the window.
    #[default]
    Array,
    /// Leaf-chunked tree; cheaper inserts on large windows, no window moves.
    Tree,
}

/// Window configuration for top-K operators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopKOptions {
    pub limit: Limit,
    pub offset: usize,
    pub index: IndexKind,
}

impl TopKOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = limit.into();
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    /// Applies a window update, keeping fields the update leaves unset.
    pub fn apply(&mut self, update: WindowUpdate) {
        if let Some(offset) = update.offset {
            self.offset = offset;
        }
        if let Some(limit) = update.limit {
            self.limit = limit;
        }
    }
}

/// A requested window change; unset fields keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowUpdate {
    pub offset: Option<usize>,
    pub limit: Option<Limit>,
}

impl WindowUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }
}

/// A sorted collection with a visible window.
pub trait TopK<E>: Send {
    /// Number of visible elements.
    fn size(&self) -> usize;

    /// Number of stored elements, visible or not.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an element and reports the window changes.
    fn insert(&mut self, value: E) -> Result<TopKChanges<E>>;

    /// Removes an element that compares equal to `value`.
    ///
    /// Fails with `Error::MissingElement` if no such element is stored.
    fn delete(&mut self, value: &E) -> Result<TopKChanges<E>>;

    /// Moves the window.
    fn move_window(&mut self, update: WindowUpdate) -> Result<TopKMoveChanges<E>>;

    /// Stored elements in sorted order.
    fn to_vec(&self) -> Vec<IndexedValue<E>>
    where
        E: Clone;

    /// Visible elements in sorted order.
    fn visible(&self) -> Vec<IndexedValue<E>>
    where
        E: Clone;
}

/// Creates an empty index of the requested kind.
pub fn new_index<E: Clone + Send + 'static>(
    options: &TopKOptions,
    comparator: Comparator<E>,
) -> Box<dyn TopK<E>> {
    match options.index {
        IndexKind::Array => Box::new(TopKArray::new(
            options.offset,
            options.limit,
            comparator,
        )),
        IndexKind::Tree => Box::new(TopKTree::new(
            options.offset,
            options.limit,
            comparator,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_end() {
        assert_eq!(Limit::Bounded(3).end(2), Some(5));
        assert_eq!(Limit::Unbounded.end(2), None);
        assert_eq!(Limit::Bounded(usize::MAX).end(1), Some(usize::MAX));
    }

    #[test]
    fn test_options_builder() {
        let mut options = TopKOptions::new().with_limit(10).with_offset(5);
        assert_eq!(options.limit, Limit::Bounded(10));
        assert_eq!(options.index, IndexKind::Array);

        options.apply(WindowUpdate::new().with_offset(0));
        assert_eq!(options.offset, 0);
        assert_eq!(options.limit, Limit::Bounded(10));

        options.apply(WindowUpdate::new().with_limit(Limit::Unbounded));
        assert_eq!(options.limit, Limit::Unbounded);
    }
}
