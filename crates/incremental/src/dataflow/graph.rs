//! Dataflow graph management.

use crate::dataflow::channel::{Channels, Consumer, Data, Reader, StreamId, Writer};
use crate::dataflow::operator::{Operator, OperatorId};
use crate::multiset::MultiSet;
use crate::topk::WindowUpdate;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::marker::PhantomData;
use rivulet_core::{Error, HasherContext, Result};
use tracing::{debug, trace};

/// A typed handle to a stream of batches.
pub struct Stream<T> {
    id: StreamId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stream<T> {}

impl<T> core::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Stream").field(&self.id).finish()
    }
}

impl<T> Stream<T> {
    fn new(id: StreamId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the stream's id.
    pub fn id(&self) -> StreamId {
        self.id
    }
}

/// Host-side handle for feeding batches into the graph.
pub struct InputHandle<T> {
    writer: Writer<T>,
    stream: Stream<T>,
}

impl<T> InputHandle<T> {
    /// The stream carrying this input's batches.
    pub fn stream(&self) -> Stream<T> {
        self.stream
    }
}

/// Host-side handle for draining batches out of the graph.
pub struct OutputHandle<T> {
    reader: Reader<T>,
}

/// Host-side handle for re-windowing a windowed operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowHandle {
    operator: OperatorId,
}

impl WindowHandle {
    pub(crate) fn new(operator: OperatorId) -> Self {
        Self { operator }
    }

    /// The operator this handle controls.
    pub fn operator(&self) -> OperatorId {
        self.operator
    }
}

/// A dataflow graph: an arena of operators and the channels between them.
///
/// Operators are stored in creation order. An operator can only read streams
/// that exist when it is created, so creation order is a topological order
/// and one pass in that order sees every batch its producers wrote.
pub struct Graph {
    /// Hashing parameters shared by every operator of this graph
    context: Arc<HasherContext>,
    /// Operators in topological order
    operators: Vec<Box<dyn Operator>>,
    /// Stream subscriptions and channel queues
    channels: Channels,
}

impl Graph {
    /// Creates a new empty graph.
    pub fn new(context: Arc<HasherContext>) -> Self {
        Self {
            context,
            operators: Vec::new(),
            channels: Channels::new(),
        }
    }

    /// Returns the hashing context shared by this graph's operators.
    pub fn context(&self) -> &Arc<HasherContext> {
        &self.context
    }

    /// Creates a new input stream.
    pub fn new_input<T: Data>(&mut self) -> InputHandle<T> {
        let (writer, stream) = self.new_stream();
        InputHandle { writer, stream }
    }

    /// Queues a batch on an input. It is processed by the next `run`.
    pub fn send<T: Data>(&mut self, input: &InputHandle<T>, batch: MultiSet<T>) -> Result<()> {
        input.writer.send(&mut self.channels, batch)
    }

    /// Subscribes the host to a stream.
    pub fn output<T: Data>(&mut self, stream: Stream<T>) -> Result<OutputHandle<T>> {
        let channel = self.channels.subscribe(stream.id, Consumer::Host)?;
        Ok(OutputHandle {
            reader: Reader::new(channel),
        })
    }

    /// Takes every batch written to `output` since the last call.
    pub fn take_output<T: Data>(&mut self, output: &OutputHandle<T>) -> Result<Vec<MultiSet<T>>> {
        output.reader.drain(&mut self.channels)
    }

    /// Creates a fresh stream and its writer, for operator construction.
    pub fn new_stream<T: Data>(&mut self) -> (Writer<T>, Stream<T>) {
        let id = self.channels.new_stream();
        (Writer::new(id), Stream::new(id))
    }

    /// Creates an operator-consumed channel on `stream`.
    pub fn connect<T: Data>(&mut self, stream: Stream<T>) -> Result<Reader<T>> {
        let channel = self.channels.subscribe(stream.id, Consumer::Operator)?;
        Ok(Reader::new(channel))
    }

    /// Adds an operator to the graph.
    ///
    /// Returns the operator ID assigned to this operator.
    pub fn add_operator<O: Operator + 'static>(&mut self, operator: O) -> OperatorId {
        let id = self.operators.len();
        trace!(operator = operator.name(), id, "operator added");
        self.operators.push(Box::new(operator));
        id
    }

    /// Runs every operator once, in topological order.
    pub fn step(&mut self) -> Result<()> {
        for (id, operator) in self.operators.iter_mut().enumerate() {
            trace!(operator = operator.name(), id, "run");
            operator.run(&mut self.channels)?;
        }
        Ok(())
    }

    /// Runs passes until no operator has pending input.
    pub fn run(&mut self) -> Result<()> {
        let mut passes = 0usize;
        while self.channels.has_pending_work() {
            self.step()?;
            passes += 1;
        }
        debug!(passes, operators = self.operators.len(), "dataflow run complete");
        Ok(())
    }

    /// Returns true if some operator has input waiting.
    pub fn pending_work(&self) -> bool {
        self.channels.has_pending_work()
    }

    /// Moves the window of a windowed operator.
    ///
    /// The resulting moves are written to the operator's output and reach
    /// consumers on the next `run`.
    pub fn move_window(&mut self, handle: &WindowHandle, update: WindowUpdate) -> Result<bool> {
        let operator = self
            .operators
            .get_mut(handle.operator)
            .ok_or(Error::UnknownOperator {
                operator: handle.operator,
            })?;
        let window = operator.window().ok_or(Error::NotWindowed {
            operator: handle.operator,
        })?;
        debug!(operator = handle.operator, ?update, "move window");
        window.move_window(update, &mut self.channels)
    }

    /// Number of elements currently visible in a windowed operator.
    pub fn window_size(&self, handle: &WindowHandle) -> Result<usize> {
        let operator = self
            .operators
            .get(handle.operator)
            .ok_or(Error::UnknownOperator {
                operator: handle.operator,
            })?;
        operator
            .window_ref()
            .map(|w| w.size())
            .ok_or(Error::NotWindowed {
                operator: handle.operator,
            })
    }

    /// Returns the number of operators in the graph.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns true if the graph has no operators.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Returns the names of all operators in execution order.
    pub fn operator_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operators.iter().map(|op| op.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn graph() -> Graph {
        Graph::new(Arc::new(HasherContext::from_seed(1)))
    }

    #[test]
    fn test_input_to_output() {
        let mut graph = graph();
        let input = graph.new_input::<i64>();
        let output = graph.output(input.stream()).unwrap();

        graph.send(&input, MultiSet::from(vec![(1, 1)])).unwrap();
        graph.run().unwrap();

        let batches = graph.take_output(&output).unwrap();
        assert_eq!(batches, vec![MultiSet::from(vec![(1, 1)])]);
        assert!(graph.take_output(&output).unwrap().is_empty());
    }

    #[test]
    fn test_operators_run_in_creation_order() {
        let mut graph = graph();
        let input = graph.new_input::<i64>();
        let doubled = graph.map(input.stream(), |x| x * 2).unwrap();
        let shifted = graph.map(doubled, |x| x + 1).unwrap();
        let output = graph.output(shifted).unwrap();

        graph.send(&input, MultiSet::from(vec![(5, 1)])).unwrap();
        graph.step().unwrap();

        // a single pass carries the batch through both operators
        assert!(!graph.pending_work());
        assert_eq!(
            graph.take_output(&output).unwrap(),
            vec![MultiSet::from(vec![(11, 1)])]
        );
        assert_eq!(graph.operator_names().collect::<Vec<_>>(), vec!["map", "map"]);
    }

    #[test]
    fn test_window_calls_on_plain_operator() {
        let mut graph = graph();
        let input = graph.new_input::<i64>();
        graph.map(input.stream(), |x| *x).unwrap();

        let handle = WindowHandle::new(0);
        assert_eq!(
            graph.window_size(&handle),
            Err(Error::NotWindowed { operator: 0 })
        );
        assert_eq!(
            graph.move_window(&WindowHandle::new(7), WindowUpdate::default()),
            Err(Error::UnknownOperator { operator: 7 })
        );
    }
}
