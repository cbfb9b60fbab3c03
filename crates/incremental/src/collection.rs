//! Keyed consolidation of diff entries.
//!
//! A ConsolidatedCollection sums multiplicities per key while remembering the
//! first value seen for each key and the order in which keys first appeared,
//! so draining it yields a deterministic, net diff.

use crate::delta::{Delta, Multiplicity};
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashMap;

/// A collection that consolidates deltas by key.
///
/// Insert/delete pairs for the same key cancel out; keys whose net
/// multiplicity is zero are skipped when iterating or draining.
#[derive(Clone, Debug)]
pub struct ConsolidatedCollection<K, V> {
    /// Map from key to its slot in `entries`
    slots: HashMap<K, usize>,
    /// (representative value, net diff) in first-appearance order
    entries: Vec<(V, Multiplicity)>,
}

impl<K, V> Default for ConsolidatedCollection<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ConsolidatedCollection<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new empty consolidated collection.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Applies a delta, consolidating with existing entries.
    ///
    /// The first value applied under a key stays its representative.
    pub fn apply(&mut self, key: K, value: V, diff: Multiplicity) {
        match self.slots.get(&key) {
            Some(&slot) => self.entries[slot].1 += diff,
            None => {
                self.slots.insert(key, self.entries.len());
                self.entries.push((value, diff));
            }
        }
    }

    /// Returns the net diff accumulated for `key`.
    pub fn multiplicity(&self, key: &K) -> Multiplicity {
        self.slots
            .get(key)
            .map(|&slot| self.entries[slot].1)
            .unwrap_or(0)
    }

    /// Returns the number of entries with non-zero diff.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|(_, diff)| *diff != 0).count()
    }

    /// Returns true if there are no entries with non-zero diff.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, diff)| *diff == 0)
    }

    /// Returns an iterator over entries with non-zero diff, in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = (&V, Multiplicity)> {
        self.entries
            .iter()
            .filter(|(_, diff)| *diff != 0)
            .map(|(v, diff)| (v, *diff))
    }

    /// Returns an iterator over `(key, value, diff)` for non-zero entries.
    pub fn iter_keyed(&self) -> impl Iterator<Item = (&K, &V, Multiplicity)> {
        // slots are unordered, so walk them and sort by slot to keep arrival order
        let mut keyed: Vec<(&K, usize)> = self.slots.iter().map(|(k, &slot)| (k, slot)).collect();
        keyed.sort_unstable_by_key(|&(_, slot)| slot);
        keyed.into_iter().filter_map(move |(k, slot)| {
            let (v, diff) = &self.entries[slot];
            (*diff != 0).then_some((k, v, *diff))
        })
    }

    /// Drains all entries with non-zero diff as deltas.
    pub fn into_deltas(self) -> Vec<Delta<V>> {
        self.entries
            .into_iter()
            .filter(|(_, diff)| *diff != 0)
            .map(|(v, diff)| Delta::new(v, diff))
            .collect()
    }
}
