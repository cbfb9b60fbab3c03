//! Dataflow graph for incremental view maintenance.
//!
//! A graph owns its operators and the channels between them. The host feeds
//! batches through input handles, calls `Graph::run`, and drains output
//! handles.

mod channel;
mod graph;
mod operator;

pub use channel::{ChannelId, Channels, Consumer, Data, Reader, StreamId, Writer};
pub use graph::{Graph, InputHandle, OutputHandle, Stream, WindowHandle};
pub use operator::{Operator, OperatorId, WindowControl};
