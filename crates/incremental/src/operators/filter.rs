//! Filter operator.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::multiset::MultiSet;
use alloc::boxed::Box;
use rivulet_core::Result;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Passes through entries whose value satisfies a predicate.
///
/// Multiplicities are preserved, so a retraction of a matching value is
/// forwarded like its insertion was.
pub struct FilterOperator<T> {
    input: Reader<T>,
    output: Writer<T>,
    predicate: Predicate<T>,
}

impl<T: Data> Operator for FilterOperator<T> {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let mut out = MultiSet::new();
        for batch in self.input.drain(channels)? {
            out.extend(batch.filter(|v| (self.predicate)(v)));
        }
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Keeps the entries of `stream` whose value satisfies `predicate`.
    pub fn filter<T, F>(&mut self, stream: Stream<T>, predicate: F) -> Result<Stream<T>>
    where
        T: Data,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        self.add_operator(FilterOperator {
            input,
            output,
            predicate: Box::new(predicate),
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec;
    use rivulet_core::HasherContext;

    #[test]
    fn test_filter_preserves_diff() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let input = graph.new_input::<i32>();
        let filtered = graph.filter(input.stream(), |&x| x > 8).unwrap();
        let output = graph.output(filtered).unwrap();

        graph
            .send(&input, MultiSet::from(vec![(10, 1), (5, 1), (15, 1), (20, -1)]))
            .unwrap();
        graph.run().unwrap();

        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![(10, 1), (15, 1), (20, -1)])]
        );
    }

    #[test]
    fn test_filter_none_match() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let input = graph.new_input::<i32>();
        let filtered = graph.filter(input.stream(), |&x| x > 100).unwrap();
        let output = graph.output(filtered).unwrap();

        graph
            .send(&input, MultiSet::from(vec![(1, 1), (2, 1)]))
            .unwrap();
        graph.run().unwrap();
        assert!(graph.take_output(&output).unwrap().is_empty());
    }
}
