//! Incremental join operators: inner, left, right, full outer and anti.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::delta::Multiplicity;
use crate::multiset::MultiSet;
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rivulet_core::{ContentHash, HasherContext, Result};

/// Which rows a join emits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Matched pairs only.
    #[default]
    Inner,
    /// Matched pairs, plus left rows without a match paired with `None`.
    Left,
    /// Matched pairs, plus right rows without a match paired with `None`.
    Right,
    /// Matched pairs, plus unmatched rows of both sides.
    Full,
    /// Left rows without a match only.
    Anti,
}

impl JoinType {
    fn emits_matches(self) -> bool {
        self != JoinType::Anti
    }

    fn emits_unmatched_left(self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full | JoinType::Anti)
    }

    fn emits_unmatched_right(self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

/// One side of a join: key hash -> value hash -> (key, value, multiplicity).
///
/// Entries whose multiplicity sums to zero are removed, as are empty keys.
/// The summed multiplicity of every key is tracked separately so presence
/// checks do not scan buckets.
pub struct JoinIndex<K, V> {
    entries: HashMap<u32, HashMap<u32, (K, V, Multiplicity)>>,
    masses: HashMap<u32, Multiplicity>,
}

impl<K, V> Default for JoinIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> JoinIndex<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            masses: HashMap::new(),
        }
    }

    /// Adds `diff` occurrences of `(key, value)`.
    pub fn add(&mut self, key_hash: u32, value_hash: u32, key: K, value: V, diff: Multiplicity) {
        let bucket = self.entries.entry(key_hash).or_default();
        let entry = bucket.entry(value_hash).or_insert((key, value, 0));
        entry.2 += diff;
        if entry.2 == 0 {
            bucket.remove(&value_hash);
            if bucket.is_empty() {
                self.entries.remove(&key_hash);
            }
        }

        let mass = self.masses.entry(key_hash).or_insert(0);
        *mass += diff;
        if *mass == 0 {
            self.masses.remove(&key_hash);
        }
    }

    /// Folds every entry of `other` into this index.
    pub fn append(&mut self, other: JoinIndex<K, V>) {
        for (key_hash, bucket) in other.entries {
            for (value_hash, (key, value, diff)) in bucket {
                self.add(key_hash, value_hash, key, value, diff);
            }
        }
    }

    /// Entries stored under `key_hash`.
    pub fn matches(&self, key_hash: u32) -> impl Iterator<Item = (&K, &V, Multiplicity)> {
        self.entries
            .get(&key_hash)
            .into_iter()
            .flat_map(|bucket| bucket.values().map(|(k, v, m)| (k, v, *m)))
    }

    /// Summed multiplicity of all entries under `key_hash`.
    pub fn mass(&self, key_hash: u32) -> Multiplicity {
        self.masses.get(&key_hash).copied().unwrap_or(0)
    }

    /// Key hashes that hold at least one entry.
    pub fn key_hashes(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Key hashes whose summed multiplicity is non-zero.
    pub fn present_keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.masses.keys().copied()
    }

    /// Number of distinct (key, value) entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_batches<K, V>(
    context: &HasherContext,
    batches: Vec<MultiSet<(K, V)>>,
) -> Result<JoinIndex<K, V>>
where
    K: ContentHash,
    V: ContentHash,
{
    let mut index = JoinIndex::new();
    for delta in batches.into_iter().flatten() {
        let (key, value) = delta.data;
        let key_hash = context.hash(&key)?;
        let value_hash = context.hash(&value)?;
        index.add(key_hash, value_hash, key, value, delta.diff);
    }
    Ok(index)
}

/// Builds an output row from a key and the values on either side.
type RowFn<K, V1, V2, O> = fn(&K, Option<&V1>, Option<&V2>) -> Option<O>;

/// Join of two keyed streams.
///
/// Matched pairs follow `ΔA ⋈ B + A ⋈ ΔB + ΔA ⋈ ΔB`, where `A` and `B` are the
/// indexes before the pass. Unmatched rows are emitted when a key has no
/// partner after the pass, and re-emitted or retracted when the other side
/// of a key becomes empty or non-empty. Deltas are folded into the indexes
/// only after the output has been computed.
pub struct JoinOperator<K, V1, V2, O> {
    left: Reader<(K, V1)>,
    right: Reader<(K, V2)>,
    output: Writer<O>,
    join_type: JoinType,
    row: RowFn<K, V1, V2, O>,
    left_index: JoinIndex<K, V1>,
    right_index: JoinIndex<K, V2>,
    context: Arc<HasherContext>,
}

impl<K, V1, V2, O> JoinOperator<K, V1, V2, O> {
    fn emit(&self, out: &mut MultiSet<O>, key: &K, a: Option<&V1>, b: Option<&V2>, diff: Multiplicity) {
        if diff == 0 {
            return;
        }
        if let Some(row) = (self.row)(key, a, b) {
            out.add(row, diff);
        }
    }

    fn emit_matches(
        &self,
        out: &mut MultiSet<O>,
        delta_left: &JoinIndex<K, V1>,
        delta_right: &JoinIndex<K, V2>,
    ) {
        for key_hash in delta_left.key_hashes() {
            for (k, v1, m1) in delta_left.matches(key_hash) {
                for (_, v2, m2) in self.right_index.matches(key_hash) {
                    self.emit(out, k, Some(v1), Some(v2), m1 * m2);
                }
                for (_, v2, m2) in delta_right.matches(key_hash) {
                    self.emit(out, k, Some(v1), Some(v2), m1 * m2);
                }
            }
        }
        for key_hash in delta_right.key_hashes() {
            for (k, v2, m2) in delta_right.matches(key_hash) {
                for (_, v1, m1) in self.left_index.matches(key_hash) {
                    self.emit(out, k, Some(v1), Some(v2), m1 * m2);
                }
            }
        }
    }

    fn emit_unmatched_left(
        &self,
        out: &mut MultiSet<O>,
        delta_left: &JoinIndex<K, V1>,
        delta_right: &JoinIndex<K, V2>,
    ) {
        for key_hash in delta_left.key_hashes() {
            if self.right_index.mass(key_hash) + delta_right.mass(key_hash) == 0 {
                for (k, v1, m) in delta_left.matches(key_hash) {
                    self.emit(out, k, Some(v1), None, m);
                }
            }
        }
        for key_hash in delta_right.present_keys() {
            let before = self.right_index.mass(key_hash);
            let after = before + delta_right.mass(key_hash);
            if (before == 0) == (after == 0) {
                continue;
            }
            // the right side appeared (retract) or vanished (emit)
            let sign = if before == 0 { -1 } else { 1 };
            for (k, v1, m) in self.left_index.matches(key_hash) {
                self.emit(out, k, Some(v1), None, sign * m);
            }
        }
    }

    fn emit_unmatched_right(
        &self,
        out: &mut MultiSet<O>,
        delta_left: &JoinIndex<K, V1>,
        delta_right: &JoinIndex<K, V2>,
    ) {
        for key_hash in delta_right.key_hashes() {
            if self.left_index.mass(key_hash) + delta_left.mass(key_hash) == 0 {
                for (k, v2, m) in delta_right.matches(key_hash) {
                    self.emit(out, k, None, Some(v2), m);
                }
            }
        }
        for key_hash in delta_left.present_keys() {
            let before = self.left_index.mass(key_hash);
            let after = before + delta_left.mass(key_hash);
            if (before == 0) == (after == 0) {
                continue;
            }
            let sign = if before == 0 { -1 } else { 1 };
            for (k, v2, m) in self.right_index.matches(key_hash) {
                self.emit(out, k, None, Some(v2), sign * m);
            }
        }
    }
}

impl<K, V1, V2, O> Operator for JoinOperator<K, V1, V2, O>
where
    K: Data + ContentHash,
    V1: Data + ContentHash,
    V2: Data + ContentHash,
    O: Data,
{
    fn name(&self) -> &'static str {
        match self.join_type {
            JoinType::Inner => "join",
            JoinType::Left => "left_join",
            JoinType::Right => "right_join",
            JoinType::Full => "full_join",
            JoinType::Anti => "anti_join",
        }
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let left = self.left.drain(channels)?;
        let right = self.right.drain(channels)?;
        if left.is_empty() && right.is_empty() {
            return Ok(());
        }
        let delta_left = index_batches(&self.context, left)?;
        let delta_right = index_batches(&self.context, right)?;

        let mut out = MultiSet::new();
        if self.join_type.emits_matches() {
            self.emit_matches(&mut out, &delta_left, &delta_right);
        }
        if self.join_type.emits_unmatched_left() {
            self.emit_unmatched_left(&mut out, &delta_left, &delta_right);
        }
        if self.join_type.emits_unmatched_right() {
            self.emit_unmatched_right(&mut out, &delta_left, &delta_right);
        }

        self.left_index.append(delta_left);
        self.right_index.append(delta_right);
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Joins `left` and `right` on equal keys.
    ///
    /// A side without a match is `None`; with `JoinType::Inner` both sides
    /// are always present.
    #[allow(clippy::type_complexity)]
    pub fn join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
        join_type: JoinType,
    ) -> Result<Stream<(K, (Option<V1>, Option<V2>))>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.add_join(left, right, join_type, |k, a, b| {
            Some((k.clone(), (a.cloned(), b.cloned())))
        })
    }

    /// Joins `left` and `right`, keeping matched pairs only.
    pub fn inner_join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
    ) -> Result<Stream<(K, (V1, V2))>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.add_join(left, right, JoinType::Inner, |k, a, b| {
            Some((k.clone(), (a?.clone(), b?.clone())))
        })
    }

    /// Joins `left` and `right`, keeping every left row.
    pub fn left_join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
    ) -> Result<Stream<(K, (V1, Option<V2>))>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.add_join(left, right, JoinType::Left, |k, a, b| {
            Some((k.clone(), (a?.clone(), b.cloned())))
        })
    }

    /// Joins `left` and `right`, keeping every right row.
    pub fn right_join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
    ) -> Result<Stream<(K, (Option<V1>, V2))>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.add_join(left, right, JoinType::Right, |k, a, b| {
            Some((k.clone(), (a.cloned(), b?.clone())))
        })
    }

    /// Joins `left` and `right`, keeping every row of both sides.
    #[allow(clippy::type_complexity)]
    pub fn full_join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
    ) -> Result<Stream<(K, (Option<V1>, Option<V2>))>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.join(left, right, JoinType::Full)
    }

    /// Left rows whose key has no row on the right.
    pub fn anti_join<K, V1, V2>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
    ) -> Result<Stream<(K, V1)>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
    {
        self.add_join(left, right, JoinType::Anti, |k, a, _| {
            Some((k.clone(), a?.clone()))
        })
    }

    fn add_join<K, V1, V2, O>(
        &mut self,
        left: Stream<(K, V1)>,
        right: Stream<(K, V2)>,
        join_type: JoinType,
        row: RowFn<K, V1, V2, O>,
    ) -> Result<Stream<O>>
    where
        K: Data + ContentHash,
        V1: Data + ContentHash,
        V2: Data + ContentHash,
        O: Data,
    {
        let left = self.connect(left)?;
        let right = self.connect(right)?;
        let (output, out) = self.new_stream();
        let context = Arc::clone(self.context());
        self.add_operator(JoinOperator {
            left,
            right,
            output,
            join_type,
            row,
            left_index: JoinIndex::new(),
            right_index: JoinIndex::new(),
            context,
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::{InputHandle, OutputHandle};
    use alloc::vec;

    type Row = (i32, &'static str);
    type Outer = (i32, (Option<&'static str>, Option<&'static str>));

    fn graph() -> Graph {
        Graph::new(Arc::new(HasherContext::from_seed(5)))
    }

    /// Flattens and sorts the consolidated output of one step.
    fn rows<T: Ord + Clone>(batches: Vec<MultiSet<T>>) -> Vec<(T, Multiplicity)> {
        let mut rows: Vec<(T, Multiplicity)> = batches
            .into_iter()
            .flatten()
            .map(|d| (d.data, d.diff))
            .collect();
        rows.sort();
        rows
    }

    fn outer_graph(
        join_type: JoinType,
    ) -> (Graph, InputHandle<Row>, InputHandle<Row>, OutputHandle<Outer>) {
        let mut graph = graph();
        let employees = graph.new_input::<Row>();
        let departments = graph.new_input::<Row>();
        let joined = graph
            .join(employees.stream(), departments.stream(), join_type)
            .unwrap();
        let joined = graph.consolidate(joined).unwrap();
        let output = graph.output(joined).unwrap();
        (graph, employees, departments, output)
    }

    fn inner_graph() -> (
        Graph,
        InputHandle<Row>,
        InputHandle<Row>,
        OutputHandle<(i32, (&'static str, &'static str))>,
    ) {
        let mut graph = graph();
        let employees = graph.new_input::<Row>();
        let departments = graph.new_input::<Row>();
        let joined = graph
            .inner_join(employees.stream(), departments.stream())
            .unwrap();
        let joined = graph.consolidate(joined).unwrap();
        let output = graph.output(joined).unwrap();
        (graph, employees, departments, output)
    }

    #[test]
    fn test_join_both_sides_in_one_pass() {
        let (mut graph, emp, dept, output) = inner_graph();
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1)]))
            .unwrap();
        graph.run().unwrap();

        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![((1, ("alice", "eng")), 1)])]
        );
    }

    #[test]
    fn test_join_incremental_updates() {
        let (mut graph, emp, dept, output) = inner_graph();
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert!(graph.take_output(&output).unwrap().is_empty());

        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![((1, ("alice", "eng")), 1)])]
        );

        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), -1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![((1, ("alice", "eng")), -1)])]
        );
    }

    #[test]
    fn test_inner_join_type_wraps_both_sides() {
        let (mut graph, emp, dept, output) = outer_graph(JoinType::Inner);
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![((1, (Some("alice"), Some("eng"))), 1)]
        );
    }

    #[test]
    fn test_left_join_null_extends_and_transitions() {
        let (mut graph, emp, dept, output) = outer_graph(JoinType::Left);
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![((1, (Some("alice"), None)), 1), ((2, (Some("bob"), None)), 1)]
        );

        // a partner arrives: the null-extended row is retracted
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![
                ((1, (Some("alice"), None)), -1),
                ((1, (Some("alice"), Some("eng"))), 1),
            ]
        );

        // the partner leaves: the null-extended row comes back
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), -1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![
                ((1, (Some("alice"), None)), 1),
                ((1, (Some("alice"), Some("eng"))), -1),
            ]
        );
    }

    #[test]
    fn test_right_join_keeps_unmatched_right_rows() {
        let (mut graph, emp, dept, output) = outer_graph(JoinType::Right);
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1), ((3, "ops"), 1)]))
            .unwrap();
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![
                ((1, (Some("alice"), Some("eng"))), 1),
                ((3, (None, Some("ops"))), 1),
            ]
        );
    }

    #[test]
    fn test_full_join_keeps_both_sides() {
        let (mut graph, emp, dept, output) = outer_graph(JoinType::Full);
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1), ((3, "ops"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![
                ((1, (Some("alice"), Some("eng"))), 1),
                ((2, (Some("bob"), None)), 1),
                ((3, (None, Some("ops"))), 1),
            ]
        );

        // removing the only employee of key 1 exposes its department
        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), -1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![
                ((1, (None, Some("eng"))), 1),
                ((1, (Some("alice"), Some("eng"))), -1),
            ]
        );
    }

    #[test]
    fn test_anti_join_emits_unmatched_left_only() {
        let mut graph = graph();
        let emp = graph.new_input::<Row>();
        let dept = graph.new_input::<Row>();
        let unmatched = graph.anti_join(emp.stream(), dept.stream()).unwrap();
        let unmatched = graph.consolidate(unmatched).unwrap();
        let output = graph.output(unmatched).unwrap();

        graph
            .send(&emp, MultiSet::from(vec![((1, "alice"), 1), ((2, "bob"), 1)]))
            .unwrap();
        graph
            .send(&dept, MultiSet::from(vec![((1, "eng"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![((2, "bob"), 1)]
        );

        graph
            .send(&dept, MultiSet::from(vec![((2, "ops"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            rows(graph.take_output(&output).unwrap()),
            vec![((2, "bob"), -1)]
        );
    }

    #[test]
    fn test_left_join_typed_output() {
        let mut graph = graph();
        let emp = graph.new_input::<Row>();
        let dept = graph.new_input::<Row>();
        let joined = graph.left_join(emp.stream(), dept.stream()).unwrap();
        let output = graph.output(joined).unwrap();

        graph
            .send(&emp, MultiSet::from(vec![((2, "bob"), 1)]))
            .unwrap();
        graph.run().unwrap();
        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![((2, ("bob", None)), 1)])]
        );
    }

    #[test]
    fn test_join_index_cancels() {
        let ctx = HasherContext::from_seed(0);
        let mut index: JoinIndex<i32, &str> = JoinIndex::new();
        let kh = ctx.hash(&1i32).unwrap();
        let vh = ctx.hash("x").unwrap();
        index.add(kh, vh, 1, "x", 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.mass(kh), 2);
        assert_eq!(index.matches(kh).map(|(_, _, m)| m).sum::<i64>(), 2);
        index.add(kh, vh, 1, "x", -2);
        assert!(index.is_empty());
        assert_eq!(index.mass(kh), 0);
        assert_eq!(index.present_keys().count(), 0);
    }
}
