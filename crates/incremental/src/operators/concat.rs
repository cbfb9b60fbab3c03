//! Concat operator.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::multiset::MultiSet;
use rivulet_core::Result;

/// Merges two streams of the same type into one.
pub struct ConcatOperator<T> {
    left: Reader<T>,
    right: Reader<T>,
    output: Writer<T>,
}

impl<T: Data> Operator for ConcatOperator<T> {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let left = self.left.drain(channels)?;
        let right = self.right.drain(channels)?;
        let mut out = MultiSet::new();
        for batch in left.into_iter().chain(right) {
            out.extend(batch);
        }
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Emits the entries of `left` followed by those of `right`.
    pub fn concat<T: Data>(&mut self, left: Stream<T>, right: Stream<T>) -> Result<Stream<T>> {
        let left = self.connect(left)?;
        let right = self.connect(right)?;
        let (output, out) = self.new_stream();
        self.add_operator(ConcatOperator {
            left,
            right,
            output,
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
    fn test_concat_two_inputs() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let a = graph.new_input::<&'static str>();
        let b = graph.new_input::<&'static str>();
        let merged = graph.concat(a.stream(), b.stream()).unwrap();
        let output = graph.output(merged).unwrap();

        graph.send(&b, MultiSet::from(vec![("y", 1)])).unwrap();
        graph.send(&a, MultiSet::from(vec![("x", -1)])).unwrap();
        graph.run().unwrap();

        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![("x", -1), ("y", 1)])]
        );
    }

    #[test]
    fn test_concat_same_stream_twice() {
        let mut graph = Graph::new(Arc::new(HasherContext::from_seed(0)));
        let a = graph.new_input::<i32>();
        let doubled = graph.concat(a.stream(), a.stream()).unwrap();
        let output = graph.output(doubled).unwrap();

        graph.send(&a, MultiSet::from(vec![(1, 1)])).unwrap();
        graph.run().unwrap();

        let batches = graph.take_output(&output).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].net_count(), 2);
    }
}
