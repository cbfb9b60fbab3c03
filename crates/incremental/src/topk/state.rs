//! Multiplicity-tracking top-K state.

use super::{
    new_index, Comparator, IndexedValue, TopK, TopKChanges, TopKMoveChanges, TopKOptions,
    WindowUpdate,
};
use crate::delta::{accumulate, Multiplicity};
use crate::group::GroupState;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rivulet_core::{Error, Result};

/// A candidate element as stored in the index.
///
/// `seq` is the arrival sequence of the element within its state; it breaks
/// ties between elements the host comparator considers equal, so earlier
/// arrivals sort first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ranked<K, V> {
    pub key: K,
    pub value: V,
    seq: u64,
}

impl<K, V> Ranked<K, V> {
    /// Arrival sequence of this element.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

struct Candidate<K, V> {
    multiplicity: Multiplicity,
    ranked: Ranked<K, V>,
}

/// Running multiplicities of `(key, value)` pairs plus the top-K index of the
/// pairs whose multiplicity is positive.
///
/// Pairs are identified by a 64-bit id (usually the key hash and the value
/// hash side by side). An id enters the index when its multiplicity goes from
/// zero to positive and leaves it when it returns to zero; the `(key, value)`
/// of the first positive change is the one stored.
pub struct TopKState<K, V> {
    multiplicities: HashMap<u64, Candidate<K, V>>,
    index: Box<dyn TopK<Ranked<K, V>>>,
    next_seq: u64,
}

impl<K, V> TopKState<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty state ordering values with `comparator`.
    pub fn new(options: &TopKOptions, comparator: Comparator<V>) -> Self {
        let ranked: Comparator<Ranked<K, V>> = Arc::new(move |a: &Ranked<K, V>, b: &Ranked<K, V>| {
            comparator(&a.value, &b.value).then(a.seq.cmp(&b.seq))
        });
        Self {
            multiplicities: HashMap::new(),
            index: new_index(options, ranked),
            next_seq: 0,
        }
    }

    /// Current multiplicity of `id`.
    pub fn multiplicity(&self, id: u64) -> Multiplicity {
        self.multiplicities.get(&id).map_or(0, |c| c.multiplicity)
    }

    /// Checks that adding `diff` to `id` keeps its multiplicity non-negative
    /// and in range.
    pub fn check(&self, id: u64, diff: Multiplicity) -> Result<()> {
        accumulate(id, self.multiplicity(id), diff).map(|_| ())
    }

    /// Adds `diff` to the multiplicity of `id` and reports the window changes.
    pub fn process(
        &mut self,
        id: u64,
        key: K,
        value: V,
        diff: Multiplicity,
    ) -> Result<TopKChanges<Ranked<K, V>>> {
        let old = self.multiplicity(id);
        let new = accumulate(id, old, diff)?;

        if old == 0 && new > 0 {
            let ranked = Ranked {
                key,
                value,
                seq: self.next_seq,
            };
            let changes = self.index.insert(ranked.clone())?;
            self.next_seq += 1;
            self.multiplicities.insert(
                id,
                Candidate {
                    multiplicity: new,
                    ranked,
                },
            );
            return Ok(changes);
        }

        if old > 0 && new == 0 {
            let changes = match self.multiplicities.get(&id) {
                Some(candidate) => self.index.delete(&candidate.ranked)?,
                None => return Err(Error::MissingElement),
            };
            self.multiplicities.remove(&id);
            return Ok(changes);
        }

        if let Some(candidate) = self.multiplicities.get_mut(&id) {
            candidate.multiplicity = new;
        }
        Ok(TopKChanges::default())
    }

    /// Moves the window of the underlying index.
    pub fn move_window(&mut self, update: WindowUpdate) -> Result<TopKMoveChanges<Ranked<K, V>>> {
        self.index.move_window(update)
    }

    /// Number of visible elements.
    pub fn size(&self) -> usize {
        self.index.size()
    }

    /// Number of ids with positive multiplicity.
    pub fn len(&self) -> usize {
        self.multiplicities.len()
    }

    /// True if no id has a positive multiplicity and nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.multiplicities.is_empty() && self.index.size() == 0
    }

    /// Visible elements in window order.
    pub fn visible(&self) -> Vec<IndexedValue<Ranked<K, V>>> {
        self.index.visible()
    }
}

impl<K, V> GroupState for TopKState<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn is_empty(&self) -> bool {
        TopKState::is_empty(self)
    }
}
