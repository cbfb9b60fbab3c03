//! Top-K operators with fractional indices.
//!
//! The operators consume `(key, value)` pairs and emit `(key, (value, index))`
//! for the pairs visible in each group's window: `+1` when a pair moves in,
//! `-1` (with the index it was emitted with) when it moves out.

use crate::collection::ConsolidatedCollection;
use crate::dataflow::{
    Channels, Data, Graph, Operator, Reader, Stream, WindowControl, WindowHandle, Writer,
};
use crate::delta::accumulate;
use crate::fractional::FractionalIndex;
use crate::group::GroupMap;
use crate::multiset::MultiSet;
use crate::topk::{
    Comparator, IndexKind, IndexedValue, Limit, Ranked, TopKChanges, TopKOptions, TopKState,
    WindowUpdate,
};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use rivulet_core::{ContentHash, Error, HasherContext, Result};
use tracing::trace;

/// A windowed output row: the key and its value with its order key.
pub type Indexed<K, V> = (K, (V, FractionalIndex));

type GroupFn<K, V> = Box<dyn Fn(&K, &V, &HasherContext) -> Result<u32> + Send + Sync>;

fn indexed<K, V>(item: IndexedValue<Ranked<K, V>>) -> Indexed<K, V> {
    let (ranked, index) = item.into_parts();
    let (key, value) = ranked.into_parts();
    (key, (value, index))
}

fn emit<K, V>(out: &mut MultiSet<Indexed<K, V>>, changes: TopKChanges<Ranked<K, V>>) {
    if let Some(item) = changes.move_in {
        out.add(indexed(item), 1);
    }
    if let Some(item) = changes.move_out {
        out.add(indexed(item), -1);
    }
}

/// Keeps a top-K window per group and emits the window changes.
pub struct TopKOperator<K, V> {
    input: Reader<(K, V)>,
    output: Writer<Indexed<K, V>>,
    context: Arc<HasherContext>,
    comparator: Comparator<V>,
    group: Option<GroupFn<K, V>>,
    /// Window used by new groups; updated by every window move
    options: TopKOptions,
    groups: GroupMap<TopKState<K, V>>,
}

impl<K, V> TopKOperator<K, V>
where
    K: Data + ContentHash + Sync,
    V: Data + ContentHash + Sync,
{
    fn validate(&self, changes: &ConsolidatedCollection<(u32, u64), (K, V)>) -> Result<()> {
        for (&(group, id), _, diff) in changes.iter_keyed() {
            let current = self.groups.get(group).map_or(0, |s| s.multiplicity(id));
            accumulate(id, current, diff)?;
        }
        Ok(())
    }

    /// Applies validated changes, retractions first, recording every group it
    /// visits in `touched`.
    ///
    /// After `validate` the multiplicity arithmetic cannot fail; `process`
    /// only errors if the comparator is not a total order, in which case the
    /// groups handled before the failing entry keep their changes.
    fn apply(
        &mut self,
        changes: &ConsolidatedCollection<(u32, u64), (K, V)>,
        out: &mut MultiSet<Indexed<K, V>>,
        touched: &mut Vec<u32>,
    ) -> Result<()> {
        // retractions first, so an update frees its slot before the new
        // value competes for it
        for retractions in [true, false] {
            for (&(group, id), (key, value), diff) in changes.iter_keyed() {
                if (diff < 0) != retractions {
                    continue;
                }
                touched.push(group);
                let state = self.groups.get_or_insert_with(group, || {
                    TopKState::new(&self.options, Arc::clone(&self.comparator))
                });
                emit(out, state.process(id, key.clone(), value.clone(), diff)?);
            }
        }
        Ok(())
    }
}

impl<K, V> Operator for TopKOperator<K, V>
where
    K: Data + ContentHash + Sync,
    V: Data + ContentHash + Sync,
{
    fn name(&self) -> &'static str {
        if self.group.is_some() {
            "grouped_top_k"
        } else {
            "top_k"
        }
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let batches = self.input.drain(channels)?;
        if batches.is_empty() {
            return Ok(());
        }

        let mut changes = ConsolidatedCollection::new();
        for delta in batches.into_iter().flatten() {
            let (key, value) = &delta.data;
            let group = match &self.group {
                Some(group) => group(key, value, &self.context)?,
                None => 0,
            };
            let id = (u64::from(self.context.hash(key)?) << 32) | u64::from(self.context.hash(value)?);
            changes.apply((group, id), delta.data, delta.diff);
        }
        self.validate(&changes)?;

        let mut out = MultiSet::new();
        let mut touched = Vec::new();
        let applied = self.apply(&changes, &mut out, &mut touched);
        // evict even when the batch failed part way
        for group in touched {
            self.groups.evict_if_empty(group);
        }
        applied?;

        trace!(
            operator = self.name(),
            changes = out.len(),
            groups = self.groups.len(),
            "top-k batch"
        );
        self.output.send(channels, out)
    }

    fn window(&mut self) -> Option<&mut dyn WindowControl> {
        Some(self)
    }

    fn window_ref(&self) -> Option<&dyn WindowControl> {
        Some(self)
    }
}

impl<K, V> WindowControl for TopKOperator<K, V>
where
    K: Data + ContentHash + Sync,
    V: Data + ContentHash + Sync,
{
    fn size(&self) -> usize {
        self.groups.values().map(TopKState::size).sum()
    }

    fn move_window(&mut self, update: WindowUpdate, channels: &mut Channels) -> Result<bool> {
        if self.options.index == IndexKind::Tree {
            return Err(Error::unsupported_operation("move", "tree"));
        }
        let before = self.options;
        self.options.apply(update);
        let window = WindowUpdate {
            offset: Some(self.options.offset),
            limit: Some(self.options.limit),
        };

        let mut out = MultiSet::new();
        let mut changed = self.groups.is_empty() && before != self.options;
        for group in self.groups.keys() {
            let Some(state) = self.groups.get_mut(group) else {
                continue;
            };
            let moves = state.move_window(window)?;
            changed |= moves.changes;
            for item in moves.move_ins {
                out.add(indexed(item), 1);
            }
            for item in moves.move_outs {
                out.add(indexed(item), -1);
            }
        }
        self.output.send(channels, out)?;
        Ok(changed)
    }
}

impl Graph {
    /// Keeps the top-K window of `stream` independently per group.
    ///
    /// Values are ordered by `comparator`; values it considers equal are
    /// ordered by arrival. The returned handle moves the window of every
    /// group at once.
    pub fn grouped_top_k_with_fractional_index<K, V, G, C, FG>(
        &mut self,
        stream: Stream<(K, V)>,
        comparator: C,
        group_key_fn: FG,
        options: TopKOptions,
    ) -> Result<(Stream<Indexed<K, V>>, WindowHandle)>
    where
        K: Data + ContentHash + Sync,
        V: Data + ContentHash + Sync,
        G: ContentHash,
        C: Fn(&V, &V) -> Ordering + Send + Sync + 'static,
        FG: Fn(&K, &V) -> G + Send + Sync + 'static,
    {
        let group: GroupFn<K, V> = Box::new(move |k: &K, v: &V, ctx: &HasherContext| {
            ctx.hash(&group_key_fn(k, v))
        });
        self.add_top_k(stream, Arc::new(comparator), Some(group), options)
    }

    /// Keeps the top-K window of `stream`.
    pub fn top_k_with_fractional_index<K, V, C>(
        &mut self,
        stream: Stream<(K, V)>,
        comparator: C,
        options: TopKOptions,
    ) -> Result<(Stream<Indexed<K, V>>, WindowHandle)>
    where
        K: Data + ContentHash + Sync,
        V: Data + ContentHash + Sync,
        C: Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    {
        self.add_top_k(stream, Arc::new(comparator), None, options)
    }

    /// Orders all of `stream`, assigning every value a fractional index.
    pub fn order_by_with_fractional_index<K, V, C>(
        &mut self,
        stream: Stream<(K, V)>,
        comparator: C,
    ) -> Result<(Stream<Indexed<K, V>>, WindowHandle)>
    where
        K: Data + ContentHash + Sync,
        V: Data + ContentHash + Sync,
        C: Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    {
        let options = TopKOptions::new().with_limit(Limit::Unbounded);
        self.add_top_k(stream, Arc::new(comparator), None, options)
    }

    fn add_top_k<K, V>(
        &mut self,
        stream: Stream<(K, V)>,
        comparator: Comparator<V>,
        group: Option<GroupFn<K, V>>,
        options: TopKOptions,
    ) -> Result<(Stream<Indexed<K, V>>, WindowHandle)>
    where
        K: Data + ContentHash + Sync,
        V: Data + ContentHash + Sync,
    {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        let context = Arc::clone(self.context());
        let id = self.add_operator(TopKOperator {
            input,
            output,
            context,
            comparator,
            group,
            options,
            groups: GroupMap::new(),
        });
        Ok((out, WindowHandle::new(id)))
    }
}
