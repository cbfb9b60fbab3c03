//! Inspect operator.

use crate::dataflow::{Channels, Data, Graph, Operator, Reader, Stream, Writer};
use crate::multiset::MultiSet;
use alloc::boxed::Box;
use rivulet_core::Result;

type InspectFn<T> = Box<dyn Fn(&MultiSet<T>) + Send + Sync>;

/// Calls a callback with every input batch and forwards the entries unchanged.
pub struct InspectOperator<T> {
    input: Reader<T>,
    output: Writer<T>,
    callback: InspectFn<T>,
}

impl<T: Data> Operator for InspectOperator<T> {
    fn name(&self) -> &'static str {
        "inspect"
    }

    fn run(&mut self, channels: &mut Channels) -> Result<()> {
        let mut out = MultiSet::new();
        for batch in self.input.drain(channels)? {
            (self.callback)(&batch);
            out.extend(batch);
        }
        self.output.send(channels, out)
    }
}

impl Graph {
    /// Taps `stream`, calling `callback` with each batch that passes.
    pub fn inspect<T, F>(&mut self, stream: Stream<T>, callback: F) -> Result<Stream<T>>
    where
        T: Data,
        F: Fn(&MultiSet<T>) + Send + Sync + 'static,
    {
        let input = self.connect(stream)?;
        let (output, out) = self.new_stream();
        self.add_operator(InspectOperator {
            input,
            output,
            callback: Box::new(callback),
        });
        Ok(out)
    }
}
