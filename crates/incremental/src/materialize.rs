//! Consumer-side materialized view.
//!
//! A MaterializedView folds the batches drained from an output handle into the
//! current result: a multiset of rows keyed by content hash.

use crate::delta::{accumulate, Multiplicity};
use crate::multiset::MultiSet;
use crate::operators::Indexed;
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rivulet_core::{ContentHash, Error, HasherContext, Result};

/// The current contents of an output stream.
pub struct MaterializedView<T> {
    context: Arc<HasherContext>,
    result_map: HashMap<u32, (T, Multiplicity)>,
}

impl<T: ContentHash + Clone> MaterializedView<T> {
    pub fn new(context: Arc<HasherContext>) -> Self {
        Self {
            context,
            result_map: HashMap::new(),
        }
    }

    pub fn with_initial(context: Arc<HasherContext>, initial: Vec<T>) -> Result<Self> {
        let mut view = Self::new(context);
        let batch: MultiSet<T> = initial.into_iter().map(|row| (row, 1)).collect();
        view.apply(&batch)?;
        Ok(view)
    }

    /// Applies one output batch.
    ///
    /// The batch is rejected as a whole if any row would end up with a
    /// negative multiplicity.
    pub fn apply(&mut self, batch: &MultiSet<T>) -> Result<()> {
        let mut net: HashMap<u32, (&T, Multiplicity)> = HashMap::new();
        for delta in batch {
            let hash = self.context.hash(&delta.data)?;
            let entry = net.entry(hash).or_insert((&delta.data, 0));
            entry.1 = entry
                .1
                .checked_add(delta.diff)
                .ok_or_else(|| Error::multiplicity_overflow(u64::from(hash)))?;
        }
        for (&hash, &(_, diff)) in &net {
            accumulate(u64::from(hash), self.multiplicity_of(hash), diff)?;
        }
        for (hash, (row, diff)) in net {
            if diff == 0 {
                continue;
            }
            let entry = self.result_map.entry(hash).or_insert_with(|| (row.clone(), 0));
            // in range after the check above
            entry.1 = entry.1.wrapping_add(diff);
            if entry.1 == 0 {
                self.result_map.remove(&hash);
            }
        }
        Ok(())
    }

    /// Applies every batch in order.
    pub fn apply_all(&mut self, batches: &[MultiSet<T>]) -> Result<()> {
        batches.iter().try_for_each(|batch| self.apply(batch))
    }

    fn multiplicity_of(&self, hash: u32) -> Multiplicity {
        self.result_map.get(&hash).map_or(0, |(_, m)| *m)
    }

    /// Multiplicity of `row` in the view.
    pub fn multiplicity(&self, row: &T) -> Result<Multiplicity> {
        Ok(self.multiplicity_of(self.context.hash(row)?))
    }

    pub fn contains(&self, row: &T) -> Result<bool> {
        Ok(self.multiplicity(row)? > 0)
    }

    /// Distinct rows with their multiplicities.
    pub fn entries(&self) -> impl Iterator<Item = (&T, Multiplicity)> {
        self.result_map.values().map(|(row, m)| (row, *m))
    }

    /// All rows, each repeated by its multiplicity.
    pub fn result(&self) -> Vec<T> {
        self.result_map
            .values()
            .flat_map(|(row, m)| core::iter::repeat(row).take(*m as usize))
            .cloned()
            .collect()
    }

    /// Number of distinct rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.result_map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.result_map.is_empty()
    }

    pub fn clear(&mut self) {
        self.result_map.clear();
    }
}

impl<K, V> MaterializedView<Indexed<K, V>>
where
    K: ContentHash + Clone,
    V: ContentHash + Clone,
{
    /// Visible `(key, value)` pairs of a windowed output, in index order.
    pub fn ordered(&self) -> Vec<(K, V)> {
        let mut rows: Vec<&Indexed<K, V>> = self.result_map.values().map(|(row, _)| row).collect();
        rows.sort_by(|a, b| a.1 .1.cmp(&b.1 .1));
        rows.into_iter()
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;

    fn ctx() -> Arc<HasherContext> {
        Arc::new(HasherContext::from_seed(4))
    }

    #[test]
    fn test_apply_and_retract() {
        let mut view = MaterializedView::new(ctx());
        view.apply(&MultiSet::from(vec![("a", 1), ("b", 2)])).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.multiplicity(&"b").unwrap(), 2);

        view.apply(&MultiSet::from(vec![("b", -2), ("a", 1)])).unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(view.result(), vec!["a", "a"]);
        assert!(!view.contains(&"b").unwrap());
    }

    #[test]
    fn test_negative_rejected_atomically() {
        let mut view = MaterializedView::with_initial(ctx(), vec![1i64]).unwrap();
        let err = view
            .apply(&MultiSet::from(vec![(2i64, 1), (1, -2)]))
            .unwrap_err();
        assert!(err.is_consistency_violation());
        assert_eq!(view.entries().collect::<Vec<_>>(), vec![(&1, 1)]);
    }

    #[test]
    fn test_overflow_rejected_atomically() {
        let mut view = MaterializedView::new(ctx());
        view.apply(&MultiSet::from(vec![("a", i64::MAX)])).unwrap();

        let err = view
            .apply(&MultiSet::from(vec![("b", 1), ("a", 1)]))
            .unwrap_err();
        assert!(err.is_consistency_violation());
        assert!(!view.contains(&"b").unwrap());

        // the batch itself sums past the range
        let err = view
            .apply(&MultiSet::from(vec![("c", i64::MAX), ("c", 1)]))
            .unwrap_err();
        assert!(err.is_consistency_violation());
        assert_eq!(view.len(), 1);
        assert_eq!(view.multiplicity(&"a").unwrap(), i64::MAX);
    }

    #[test]
    fn test_ordered_by_index() {
        let mut view: MaterializedView<Indexed<&str, i32>> = MaterializedView::new(ctx());
        view.apply_all(&[
            MultiSet::from(vec![
                (("b", (2, String::from("a1"))), 1),
                (("a", (1, String::from("a0"))), 1),
            ]),
            MultiSet::from(vec![
                (("b", (2, String::from("a1"))), -1),
                (("c", (0, String::from("Zz"))), 1),
            ]),
        ])
        .unwrap();
        assert_eq!(view.ordered(), vec![("c", 0), ("a", 1)]);
    }
}
