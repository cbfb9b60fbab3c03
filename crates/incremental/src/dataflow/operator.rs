//! The operator contract.

use crate::dataflow::channel::Channels;
use crate::topk::WindowUpdate;
use rivulet_core::Result;

/// Index of an operator inside its graph.
pub type OperatorId = usize;

/// A node of the dataflow graph.
///
/// `run` is called once per pass, after every upstream operator has run. It
/// must drain all pending input batches, compute its whole output and only
/// then write it, at most one batch per output stream. An error must leave
/// the operator's state as it was before the call.
pub trait Operator: Send {
    /// Short, static name used in logs.
    fn name(&self) -> &'static str;

    /// Processes all pending input.
    fn run(&mut self, channels: &mut Channels) -> Result<()>;

    /// The operator's window, if it maintains one.
    fn window(&mut self) -> Option<&mut dyn WindowControl> {
        None
    }

    /// Read-only access to the operator's window, if it maintains one.
    fn window_ref(&self) -> Option<&dyn WindowControl> {
        None
    }
}

/// Host-facing control over a windowed operator.
pub trait WindowControl {
    /// Number of elements currently visible across all groups.
    fn size(&self) -> usize;

    /// Changes offset and/or limit, writing the resulting moves to the output.
    ///
    /// Returns true if the visible range changed, even when no loaded
    /// element moved.
    fn move_window(&mut self, update: WindowUpdate, channels: &mut Channels) -> Result<bool>;
}
