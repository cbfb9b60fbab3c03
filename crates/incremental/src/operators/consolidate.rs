//! Consolidate operator.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::multiset::MultiSet;
use alloc::sync::Arc;
use rivulet_core::{ContentHash, HasherContext, Result};

/// Merges all pending batches into one net batch.
///
/// Entries with the same content hash are summed and entries that cancel out
/// are dropped, so a move-out and move-in of the same indexed element in one
/// pass disappear.
pub struct ConsolidateOperator<T> {
    input: Reader<T>,
    output: Writer<T>,
    context: Arc<HasherContext>,
}

impl<T: Data + ContentHash> Operator for ConsolidateOperator<T> {
    fn name(&self) -> &'static str {
        "consolidate"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let mut pending = MultiSet::new();
        for batch in self.input.drain(channels)? {
            pending.extend(batch);
        }
        if pending.is_empty() {
            return Ok(());
        }
        let out = pending.consolidate(&self.context)?;
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Emits one consolidated batch per pass.
    pub fn consolidate<T: Data + ContentHash>(&mut self, stream: Stream<T>) -> Result<Stream<T>> {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        let context = Arc::clone(self.context());
        self.add_operator(ConsolidateOperator {
            input,
            output,
            context,
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::vec;

    #[test]
    fn test_consolidate_across_batches() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let input = graph.new_input::<(String, String)>();
        let merged = graph.consolidate(input.stream()).unwrap();
        let output = graph.output(merged).unwrap();

        let row = |k: &str, idx: &str| (String::from(k), String::from(idx));
        graph
            .send(&input, MultiSet::from(vec![(row("a", "a0"), -1)]))
            .unwrap();
        graph
            .send(
                &input,
                MultiSet::from(vec![(row("a", "a0"), 1), (row("b", "a1"), 1)]),
            )
            .unwrap();
        graph.run().unwrap();

        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![(row("b", "a1"), 1)])]
        );
    }

    #[test]
    fn test_fully_cancelled_sends_nothing() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let input = graph.new_input::<i64>();
        let merged = graph.consolidate(input.stream()).unwrap();
        let output = graph.output(merged).unwrap();

        graph
            .send(&input, MultiSet::from(vec![(1, 1), (1, -1)]))
            .unwrap();
        graph.run().unwrap();
        assert!(graph.take_output(&output).unwrap().is_empty());
    }
}
