//! Map and negate operators.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::multiset::MultiSet;
use alloc::boxed::Box;
use rivulet_core::Result;

type MapFn<T, U> = Box<dyn Fn(&T) -> U + Send + Sync>;

/// Applies a mapper function to every entry, preserving multiplicities.
pub struct MapOperator<T, U> {
    input: Reader<T>,
    output: Writer<U>,
    mapper: MapFn<T, U>,
}

impl<T: Data, U: Data> Operator for MapOperator<T, U> {
    fn name(&self) -> &'static str {
        "map"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let mut out = MultiSet::new();
        for batch in self.input.drain(channels)? {
            for delta in batch {
                out.add((self.mapper)(&delta.data), delta.diff);
            }
        }
        self.output.send(channels, out)
    }
}

/// Flips the sign of every multiplicity.
pub struct NegateOperator<T> {
    input: Reader<T>,
    output: Writer<T>,
}

impl<T: Data> Operator for NegateOperator<T> {
    fn name(&self) -> &'static str {
        "negate"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let mut out = MultiSet::new();
        for batch in self.input.drain(channels)? {
            out.extend(batch.negate());
        }
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Transforms every value of `stream` with `mapper`.
    pub fn map<T, U, F>(&mut self, stream: Stream<T>, mapper: F) -> Result<Stream<U>>
    where
        T: Data,
        U: Data,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        self.add_operator(MapOperator {
            input,
            output,
            mapper: Box::new(mapper),
        });
        Ok(out)
    }

    /// Emits every entry of `stream` with its multiplicity negated.
    pub fn negate<T: Data>(&mut self, stream: Stream<T>) -> Result<Stream<T>> {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        self.add_operator(NegateOperator { input, output });
        Ok(out)
    }
}
