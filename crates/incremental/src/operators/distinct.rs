//! Distinct and grouped distinct operators.

use crate::collection::ConsolidatedCollection;
use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::delta::{accumulate, Multiplicity};
use crate::group::{GroupMap, GroupState};
use crate::multiset::MultiSet;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rivulet_core::{ContentHash, HasherContext, Result};

/// Hashes some projection of a value.
pub(crate) type HashFn<T> = Box<dyn Fn(&T, &HasherContext) -> Result<u32> + Send + Sync>;

/// Running multiplicities of distinct values.
///
/// Each entry keeps the value that first made its hash present; removals
/// emit that stored value, so the output always retracts exactly what it
/// inserted.
pub struct DistinctState<T> {
    entries: HashMap<u32, (T, Multiplicity)>,
}

impl<T> Default for DistinctState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DistinctState<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Current multiplicity of `hash`.
    pub fn multiplicity(&self, hash: u32) -> Multiplicity {
        self.entries.get(&hash).map_or(0, |(_, m)| *m)
    }

    /// Number of present values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that every multiplicity stays non-negative and in range.
    pub fn validate(&self, changes: &ConsolidatedCollection<u32, T>) -> Result<()> {
        for (&hash, _, diff) in changes.iter_keyed() {
            accumulate(u64::from(hash), self.multiplicity(hash), diff)?;
        }
        Ok(())
    }
}

impl<T: Clone> DistinctState<T> {
    /// Applies validated changes, appending presence crossings to `out`.
    pub fn commit(&mut self, changes: &ConsolidatedCollection<u32, T>, out: &mut MultiSet<T>) {
        for (&hash, value, diff) in changes.iter_keyed() {
            let old = self.multiplicity(hash);
            // in range after `validate`
            let new = old.wrapping_add(diff);
            if old == 0 && new > 0 {
                out.add(value.clone(), 1);
                self.entries.insert(hash, (value.clone(), new));
            } else if old > 0 && new == 0 {
                if let Some((stored, _)) = self.entries.remove(&hash) {
                    out.add(stored, -1);
                }
            } else if let Some(entry) = self.entries.get_mut(&hash) {
                entry.1 = new;
            }
        }
    }

    /// Validates and applies one consolidated batch.
    pub fn apply(&mut self, changes: &ConsolidatedCollection<u32, T>) -> Result<MultiSet<T>> {
        self.validate(changes)?;
        let mut out = MultiSet::new();
        self.commit(changes, &mut out);
        Ok(out)
    }
}

impl<T> GroupState for DistinctState<T> {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Emits a value when its multiplicity crosses from zero to positive and
/// retracts it when it returns to zero.
///
/// With a group function, each group keeps an independent state.
pub struct DistinctOperator<T> {
    input: Reader<T>,
    output: Writer<T>,
    context: Arc<HasherContext>,
    selector: HashFn<T>,
    group: Option<HashFn<T>>,
    groups: GroupMap<DistinctState<T>>,
}

impl<T: Data> Operator for DistinctOperator<T> {
    fn name(&self) -> &'static str {
        if self.group.is_some() {
            "grouped_distinct"
        } else {
            "distinct"
        }
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let batches = self.input.drain(channels)?;
        if batches.is_empty() {
            return Ok(());
        }

        // consolidate per group, in first-appearance order
        let mut slots: HashMap<u32, usize> = HashMap::new();
        let mut pending: Vec<(u32, ConsolidatedCollection<u32, T>)> = Vec::new();
        for delta in batches.into_iter().flatten() {
            let group = match &self.group {
                Some(group) => group(&delta.data, &self.context)?,
                None => 0,
            };
            let hash = (self.selector)(&delta.data, &self.context)?;
            let slot = *slots.entry(group).or_insert_with(|| {
                pending.push((group, ConsolidatedCollection::new()));
                pending.len() - 1
            });
            pending[slot].1.apply(hash, delta.data, delta.diff);
        }

        for (group, changes) in &pending {
            match self.groups.get(*group) {
                Some(state) => state.validate(changes)?,
                None => DistinctState::new().validate(changes)?,
            }
        }

        let mut out = MultiSet::new();
        for (group, changes) in &pending {
            self.groups
                .get_or_insert_with(*group, DistinctState::new)
                .commit(changes, &mut out);
            self.groups.evict_if_empty(*group);
        }
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Deduplicates `stream` by content.
    pub fn distinct<T>(&mut self, stream: Stream<T>) -> Result<Stream<T>>
    where
        T: Data + ContentHash,
    {
        self.add_distinct(stream, Box::new(|v: &T, ctx: &HasherContext| ctx.hash(v)), None)
    }

    /// Deduplicates `stream` by the content of `selector(value)`.
    pub fn distinct_by<T, S, F>(&mut self, stream: Stream<T>, selector: F) -> Result<Stream<T>>
    where
        T: Data,
        S: ContentHash,
        F: Fn(&T) -> S + Send + Sync + 'static,
    {
        self.add_distinct(
            stream,
            Box::new(move |v: &T, ctx: &HasherContext| ctx.hash(&selector(v))),
            None,
        )
    }

    /// Deduplicates `stream` by `selector(value)` independently per group.
    pub fn grouped_distinct<T, G, S, FG, FS>(
        &mut self,
        stream: Stream<T>,
        group_key_fn: FG,
        selector: FS,
    ) -> Result<Stream<T>>
    where
        T: Data,
        G: ContentHash,
        S: ContentHash,
        FG: Fn(&T) -> G + Send + Sync + 'static,
        FS: Fn(&T) -> S + Send + Sync + 'static,
    {
        self.add_distinct(
            stream,
            Box::new(move |v: &T, ctx: &HasherContext| ctx.hash(&selector(v))),
            Some(Box::new(move |v: &T, ctx: &HasherContext| {
                ctx.hash(&group_key_fn(v))
            })),
        )
    }

    fn add_distinct<T: Data>(
        &mut self,
        stream: Stream<T>,
        selector: HashFn<T>,
        group: Option<HashFn<T>>,
    ) -> Result<Stream<T>> {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        let context = Arc::clone(self.context());
        self.add_operator(DistinctOperator {
            input,
            output,
            context,
            selector,
            group,
            groups: GroupMap::new(),
        });
        Ok(out)
    }
}
