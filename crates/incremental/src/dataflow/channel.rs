//! Index-addressed channels between operators.
//!
//! Every stream has a list of subscribed channels; every channel is a FIFO of
//! pending batches with exactly one producer (the stream's writer) and one
//! consumer (an operator or the host). Batches are stored type-erased and
//! recovered through typed `Reader`/`Writer` handles.

use crate::multiset::MultiSet;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::marker::PhantomData;
use rivulet_core::{Error, Result};

/// Identifier of a stream (one writer, any number of channels).
pub type StreamId = usize;

/// Identifier of a single-producer/single-consumer channel.
pub type ChannelId = usize;

/// Types that can flow over a channel.
pub trait Data: Clone + Send + 'static {}

impl<T: Clone + Send + 'static> Data for T {}

/// Who drains a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consumer {
    /// An operator inside the graph; drained during `run`.
    Operator,
    /// The host, through an `OutputHandle`.
    Host,
}

struct Channel {
    consumer: Consumer,
    queue: Vec<Box<dyn Any + Send>>,
}

/// The channel arena owned by a graph.
#[derive(Default)]
pub struct Channels {
    subscribers: Vec<Vec<ChannelId>>,
    channels: Vec<Channel>,
}

impl Channels {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new stream with no subscribers.
    pub fn new_stream(&mut self) -> StreamId {
        self.subscribers.push(Vec::new());
        self.subscribers.len() - 1
    }

    /// Creates a channel receiving everything later sent on `stream`.
    pub fn subscribe(&mut self, stream: StreamId, consumer: Consumer) -> Result<ChannelId> {
        let id = self.channels.len();
        self.subscribers
            .get_mut(stream)
            .ok_or(Error::UnknownChannel { channel: stream })?
            .push(id);
        self.channels.push(Channel {
            consumer,
            queue: Vec::new(),
        });
        Ok(id)
    }

    /// Delivers `batch` to every channel subscribed to `stream`.
    ///
    /// A stream without subscribers drops the batch.
    pub fn send<T: Data>(&mut self, stream: StreamId, batch: MultiSet<T>) -> Result<()> {
        let subscribers = self
            .subscribers
            .get(stream)
            .ok_or(Error::UnknownChannel { channel: stream })?;
        let Some((&last, rest)) = subscribers.split_last() else {
            return Ok(());
        };
        for &channel in rest {
            self.channels[channel].queue.push(Box::new(batch.clone()));
        }
        self.channels[last].queue.push(Box::new(batch));
        Ok(())
    }

    /// Removes and returns every pending batch of `channel`.
    ///
    /// The channel is left untouched if any batch has the wrong type.
    pub fn drain<T: Data>(&mut self, channel: ChannelId) -> Result<Vec<MultiSet<T>>> {
        let slot = self
            .channels
            .get_mut(channel)
            .ok_or(Error::UnknownChannel { channel })?;
        if !slot.queue.iter().all(|batch| batch.is::<MultiSet<T>>()) {
            return Err(Error::ChannelTypeMismatch { channel });
        }
        slot.queue
            .drain(..)
            .map(|batch| {
                batch
                    .downcast::<MultiSet<T>>()
                    .map(|b| *b)
                    .map_err(|_| Error::ChannelTypeMismatch { channel })
            })
            .collect()
    }

    /// Number of batches waiting on `channel`.
    pub fn pending(&self, channel: ChannelId) -> usize {
        self.channels.get(channel).map_or(0, |c| c.queue.len())
    }

    /// Returns true if any operator-consumed channel has pending batches.
    pub fn has_pending_work(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.consumer == Consumer::Operator && !c.queue.is_empty())
    }

    /// Number of channels in the arena.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channel has been created.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Typed write end of a stream.
pub struct Writer<T> {
    stream: StreamId,
    _marker: PhantomData<fn(T)>,
}

impl<T: Data> Writer<T> {
    pub(crate) fn new(stream: StreamId) -> Self {
        Self {
            stream,
            _marker: PhantomData,
        }
    }

    /// Returns the stream this writer feeds.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Sends a non-empty batch; empty batches are not written at all.
    pub fn send(&self, channels: &mut Channels, batch: MultiSet<T>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        channels.send(self.stream, batch)
    }
}

/// Typed read end of a channel.
pub struct Reader<T> {
    channel: ChannelId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Data> Reader<T> {
    pub(crate) fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            _marker: PhantomData,
        }
    }

    /// Returns the channel this reader drains.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Drains all pending batches.
    pub fn drain(&self, channels: &mut Channels) -> Result<Vec<MultiSet<T>>> {
        channels.drain(self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_send_fans_out_to_subscribers() {
        let mut channels = Channels::new();
        let stream = channels.new_stream();
        let a = channels.subscribe(stream, Consumer::Operator).unwrap();
        let b = channels.subscribe(stream, Consumer::Host).unwrap();

        channels.send(stream, MultiSet::from(vec![(1i64, 1)])).unwrap();
        channels.send(stream, MultiSet::from(vec![(2i64, 1)])).unwrap();

        assert_eq!(channels.pending(a), 2);
        assert_eq!(channels.pending(b), 2);
        assert!(channels.has_pending_work());

        let drained: Vec<MultiSet<i64>> = channels.drain(a).unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(channels.pending(a), 0);
        assert_eq!(channels.pending(b), 2);
        // host channels are not operator work
        assert!(!channels.has_pending_work());
    }

    #[test]
    fn test_send_without_subscribers_is_dropped() {
        let mut channels = Channels::new();
        let stream = channels.new_stream();
        channels.send(stream, MultiSet::from(vec![("x", 1)])).unwrap();
        assert!(channels.is_empty());
    }

    #[test]
    fn test_type_mismatch_keeps_queue() {
        let mut channels = Channels::new();
        let stream = channels.new_stream();
        let ch = channels.subscribe(stream, Consumer::Operator).unwrap();
        channels.send(stream, MultiSet::from(vec![(1i64, 1)])).unwrap();

        let err = channels.drain::<&str>(ch).unwrap_err();
        assert_eq!(err, Error::ChannelTypeMismatch { channel: ch });
        assert_eq!(channels.pending(ch), 1);
    }

    #[test]
    fn test_unknown_ids() {
        let mut channels = Channels::new();
        assert!(channels.subscribe(9, Consumer::Host).is_err());
        assert!(channels.send(9, MultiSet::<i64>::new()).is_err());
        assert!(channels.drain::<i64>(9).is_err());
    }

    #[test]
    fn test_writer_skips_empty_batches() {
        let mut channels = Channels::new();
        let stream = channels.new_stream();
        let ch = channels.subscribe(stream, Consumer::Operator).unwrap();
        let writer = Writer::<i64>::new(stream);
        writer.send(&mut channels, MultiSet::new()).unwrap();
        assert_eq!(channels.pending(ch), 0);

        writer.send(&mut channels, MultiSet::from(vec![(5, 1)])).unwrap();
        let reader = Reader::<i64>::new(ch);
        assert_eq!(reader.drain(&mut channels).unwrap().len(), 1);
    }
}
