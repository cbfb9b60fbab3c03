//! Window bookkeeping shared by the sorted stores.

use super::{Comparator, IndexedValue, Limit, TopKChanges, TopKMoveChanges, WindowUpdate};
use crate::fractional::generate_key_between;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::ops::Range;
use rivulet_core::{Error, Result};

/// Positional access to a sorted sequence of indexed values.
pub(crate) trait SortedStore<E> {
    fn len(&self) -> usize;

    fn get(&self, pos: usize) -> Option<&IndexedValue<E>>;

    /// Number of leading elements for which `pred` holds.
    fn partition_point<P: FnMut(&E) -> bool>(&self, pred: P) -> usize;

    fn insert_at(&mut self, pos: usize, value: IndexedValue<E>);

    fn remove_at(&mut self, pos: usize) -> IndexedValue<E>;

    fn cloned(&self, pos: usize) -> Option<IndexedValue<E>>
    where
        E: Clone,
    {
        self.get(pos).cloned()
    }
}

/// The visible range `[start, end)`; `end` is `None` when unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Window {
    pub start: usize,
    pub end: Option<usize>,
}

impl Window {
    pub fn new(offset: usize, limit: Limit) -> Self {
        Self {
            start: offset,
            end: limit.end(offset),
        }
    }

    pub fn limit(&self) -> Limit {
        match self.end {
            Some(end) => Limit::Bounded(end - self.start),
            None => Limit::Unbounded,
        }
    }

    /// True if position `pos` is before the end of the window.
    fn before_end(&self, pos: usize) -> bool {
        self.end.map_or(true, |end| pos < end)
    }

    /// True if the window can never show anything.
    fn is_closed(&self) -> bool {
        self.end == Some(self.start)
    }

    /// Number of visible elements out of `len` stored ones.
    pub fn size(&self, len: usize) -> usize {
        let available = len.saturating_sub(self.start);
        match self.end {
            Some(end) => available.min(end - self.start),
            None => available,
        }
    }

    /// Visible positions out of `len` stored ones.
    pub fn visible(&self, len: usize) -> Range<usize> {
        let start = self.start.min(len);
        start..start + self.size(len)
    }

    /// Inserts `value` into `store` and reports the window changes.
    pub fn insert<E, S>(
        &self,
        store: &mut S,
        comparator: &Comparator<E>,
        value: E,
    ) -> Result<TopKChanges<E>>
    where
        E: Clone,
        S: SortedStore<E>,
    {
        let pos = store.partition_point(|e| comparator(e, &value) == Ordering::Less);
        let before = pos.checked_sub(1).and_then(|p| store.get(p));
        let after = store.get(pos);
        let index = generate_key_between(
            before.map(|v| v.index.as_str()),
            after.map(|v| v.index.as_str()),
        )?;
        store.insert_at(pos, IndexedValue::new(value, index));

        let mut changes = TopKChanges::default();
        if self.before_end(pos) && !self.is_closed() {
            // the element at max(pos, start) enters; the old last visible
            // element, now shifted to `end`, leaves
            let move_in = pos.max(self.start);
            if move_in < store.len() {
                changes.move_in = store.cloned(move_in);
                if let Some(end) = self.end {
                    changes.move_out = store.cloned(end);
                }
            }
        }
        Ok(changes)
    }

    /// Removes the element equal to `value` from `store` and reports the
    /// window changes.
    pub fn delete<E, S>(
        &self,
        store: &mut S,
        comparator: &Comparator<E>,
        value: &E,
    ) -> Result<TopKChanges<E>>
    where
        E: Clone,
        S: SortedStore<E>,
    {
        let pos = store.partition_point(|e| comparator(e, value) == Ordering::Less);
        match store.get(pos) {
            Some(found) if comparator(&found.value, value) == Ordering::Equal => {}
            _ => return Err(Error::MissingElement),
        }
        let removed = store.remove_at(pos);

        let mut changes = TopKChanges::default();
        if self.before_end(pos) && !self.is_closed() {
            changes.move_out = if pos < self.start {
                // the first visible element shifted to `start - 1`
                store.cloned(self.start - 1)
            } else {
                Some(removed)
            };
            if let Some(end) = self.end {
                changes.move_in = store.cloned(end - 1);
            }
        }
        Ok(changes)
    }

    /// Moves the window and reports the elements entering and leaving it.
    pub fn shift<E, S>(&mut self, store: &S, update: WindowUpdate) -> TopKMoveChanges<E>
    where
        E: Clone,
        S: SortedStore<E>,
    {
        let len = store.len();
        let old_range = self.start..self.end.unwrap_or(self.start + self.size(len));

        let offset = update.offset.unwrap_or(self.start);
        let limit = update.limit.unwrap_or_else(|| self.limit());
        *self = Window::new(offset, limit);

        let new_end = match self.end {
            Some(end) => end,
            None => (self.start + self.size(len)).max(old_range.end),
        };
        let new_range = self.start..new_end;

        // enumerate stored positions only; the window itself may reach far
        // past the loaded data
        let stored = |r: &Range<usize>| r.start.min(len)..r.end.min(len);
        let only_old = difference(&stored(&old_range), &stored(&new_range));
        let only_new = difference(&stored(&new_range), &stored(&old_range));

        TopKMoveChanges {
            move_ins: only_new.iter().filter_map(|&p| store.cloned(p)).collect(),
            move_outs: only_old.iter().filter_map(|&p| store.cloned(p)).collect(),
            changes: ranges_differ(&old_range, &new_range),
        }
    }
}

/// True if the two ranges cover different positions.
fn ranges_differ(a: &Range<usize>, b: &Range<usize>) -> bool {
    !(a.is_empty() && b.is_empty()) && a != b
}

/// Positions of `a` that are not in `b`.
fn difference(a: &Range<usize>, b: &Range<usize>) -> Vec<usize> {
    if b.is_empty() {
        return a.clone().collect();
    }
    let left = a.start..a.end.min(b.start).max(a.start);
    let right = b.end.max(a.start).min(a.end)..a.end;
    left.chain(right).collect()
}

/// Collects the visible slice of a store.
pub(crate) fn visible<E, S>(window: &Window, store: &S) -> Vec<IndexedValue<E>>
where
    E: Clone,
    S: SortedStore<E>,
{
    window
        .visible(store.len())
        .filter_map(|p| store.cloned(p))
        .collect()
}
