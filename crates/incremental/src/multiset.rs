//! MultiSet: the batch type flowing over dataflow channels.
//!
//! A MultiSet is an ordered bag of `(value, multiplicity)` entries describing
//! one atomic change. Entries for the same value are not merged eagerly;
//! consumers that count occurrences must consolidate first.

use crate::collection::ConsolidatedCollection;
use crate::delta::{Delta, Multiplicity};
use alloc::vec::Vec;
use rivulet_core::{ContentHash, HasherContext, Result};

/// A batch of signed diff entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSet<T> {
    inner: Vec<Delta<T>>,
}

impl<T> Default for MultiSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MultiSet<T> {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Creates an empty batch with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// Appends one entry.
    #[inline]
    pub fn add(&mut self, data: T, diff: Multiplicity) {
        self.inner.push(Delta::new(data, diff));
    }

    /// Appends one delta.
    #[inline]
    pub fn push(&mut self, delta: Delta<T>) {
        self.inner.push(delta);
    }

    /// Appends all entries of `other`.
    pub fn extend(&mut self, other: MultiSet<T>) {
        self.inner.extend(other.inner);
    }

    /// Returns the number of (unconsolidated) entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the batch has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the entries.
    #[inline]
    pub fn entries(&self) -> &[Delta<T>] {
        &self.inner
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> core::slice::Iter<'_, Delta<T>> {
        self.inner.iter()
    }

    /// Consumes the batch, returning its entries.
    pub fn into_inner(self) -> Vec<Delta<T>> {
        self.inner
    }

    /// Returns the sum of all multiplicities.
    pub fn net_count(&self) -> Multiplicity {
        self.inner.iter().map(|d| d.diff).sum()
    }

    /// Transforms every value, keeping multiplicities.
    pub fn map<U, F>(self, mut f: F) -> MultiSet<U>
    where
        F: FnMut(T) -> U,
    {
        MultiSet {
            inner: self.inner.into_iter().map(|d| d.map(&mut f)).collect(),
        }
    }

    /// Keeps entries whose value satisfies `predicate`.
    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        Self {
            inner: self
                .inner
                .into_iter()
                .filter(|d| predicate(&d.data))
                .collect(),
        }
    }

    /// Flips the sign of every multiplicity.
    pub fn negate(self) -> Self {
        Self {
            inner: self.inner.into_iter().map(Delta::negate).collect(),
        }
    }

    /// Returns `self` followed by `other`.
    pub fn concat(mut self, other: MultiSet<T>) -> Self {
        self.extend(other);
        self
    }
}

impl<T: ContentHash> MultiSet<T> {
    /// Merges entries with the same content hash and drops those that net to zero.
    ///
    /// The first occurrence of each value is kept as its representative and
    /// output order follows first appearance.
    pub fn consolidate(self, context: &HasherContext) -> Result<Self> {
        let mut consolidated = ConsolidatedCollection::new();
        for delta in self.inner {
            let hash = context.hash(&delta.data)?;
            consolidated.apply(hash, delta.data, delta.diff);
        }
        Ok(Self {
            inner: consolidated.into_deltas(),
        })
    }
}

impl<T> From<Vec<(T, Multiplicity)>> for MultiSet<T> {
    fn from(entries: Vec<(T, Multiplicity)>) -> Self {
        entries.into_iter().collect()
    }
}

impl<T> From<Vec<Delta<T>>> for MultiSet<T> {
    fn from(inner: Vec<Delta<T>>) -> Self {
        Self { inner }
    }
}

impl<T> FromIterator<(T, Multiplicity)> for MultiSet<T> {
    fn from_iter<I: IntoIterator<Item = (T, Multiplicity)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().map(Delta::from).collect(),
        }
    }
}

impl<T> FromIterator<Delta<T>> for MultiSet<T> {
    fn from_iter<I: IntoIterator<Item = Delta<T>>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for MultiSet<T> {
    type Item = Delta<T>;
    type IntoIter = alloc::vec::IntoIter<Delta<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a MultiSet<T> {
    type Item = &'a Delta<T>;
    type IntoIter = core::slice::Iter<'a, Delta<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_multiset_from_pairs() {
        let ms = MultiSet::from(vec![("a", 1), ("b", -1)]);
        assert_eq!(ms.len(), 2);
        assert_eq!(ms.net_count(), 0);
        assert_eq!(ms.entries()[1], Delta::delete("b"));
    }

    #[test]
    fn test_multiset_map_filter_negate() {
        let ms = MultiSet::from(vec![(1, 1), (2, 2), (3, -1)]);
        let out = ms.map(|x| x * 10).filter(|x| *x > 10).negate();
        assert_eq!(out, MultiSet::from(vec![(20, -2), (30, 1)]));
    }

    #[test]
    fn test_multiset_concat() {
        let a = MultiSet::from(vec![("x", 1)]);
        let b = MultiSet::from(vec![("y", 1)]);
        assert_eq!(a.concat(b).len(), 2);
    }

    #[test]
    fn test_multiset_consolidate() {
        let ctx = HasherContext::from_seed(3);
        let ms = MultiSet::from(vec![("a", 1), ("b", 1), ("a", 1), ("b", -1), ("c", -1)]);
        let out = ms.consolidate(&ctx).unwrap();
        assert_eq!(out, MultiSet::from(vec![("a", 2), ("c", -1)]));
    }

    #[test]
    fn test_multiset_consolidate_rejects_unhashable() {
        let ctx = HasherContext::from_seed(3);
        let ms = MultiSet::from(vec![(rivulet_core::Value::Bytes(vec![1]), 1)]);
        assert!(ms.consolidate(&ctx).is_err());
    }
}
