//! Persistence contracts.
//!
//! This module describes the storage contract ([`EventStore`]) and its read
//! cursor ([`EventIterator`]), plus a reference in-memory implementation.
//! Stores receive and return fully typed [`Event`]s; how they encode payloads
//! is up to them, but they resolve stored payloads through their
//! [`Serializer`] and skip reasons it does not know.
use std::{fmt, future::Future};

use crate::{
    codec::Codec,
    context::Context,
    error::Error,
    event::{Event, EventData, Version},
    registry::Serializer,
};

pub mod inmemory;

/// Abstraction over the persistence layer for event streams.
///
/// A stream is identified by `(aggregate type, aggregate id)`.
///
/// Implementations must make [`EventStore::save`] atomic per batch, reject
/// batches whose first version does not follow the stored one (see
/// [`validate_events`](crate::concurrency::validate_events)), and assign
/// strictly increasing global versions at commit time.
pub trait EventStore: Send + Sync {
    /// Event sum type this store reads and writes.
    type Data: EventData;

    /// Encoding used for payloads and metadata.
    type Codec: Codec;

    /// Cursor returned by [`EventStore::get`].
    type Iter: EventIterator<Data = Self::Data>;

    /// Registry used to decode stored payloads.
    fn serializer(&self) -> &Serializer<Self::Data, Self::Codec>;

    /// Persist one aggregate's batch atomically.
    ///
    /// On success every event's `global_version` has been assigned. On
    /// failure nothing was persisted. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] if the stream moved past the batch's base version,
    /// the validation errors of [`validate_events`], [`Error::Serialization`]
    /// if a payload cannot be encoded, or a backend error.
    ///
    /// [`validate_events`]: crate::concurrency::validate_events
    fn save<'a>(
        &'a self,
        events: &'a mut [Event<Self::Data>],
    ) -> impl Future<Output = Result<(), Error>> + Send + 'a;

    /// Open a cursor over the events of one aggregate with version strictly
    /// greater than `after_version`, in ascending version order.
    ///
    /// # Errors
    ///
    /// [`Error::NoEvents`] when no stored event matches, a cancellation error
    /// from `ctx`, or a backend error.
    fn get<'a>(
        &'a self,
        ctx: &'a Context,
        id: &'a str,
        aggregate_type: &'a str,
        after_version: Version,
    ) -> impl Future<Output = Result<Self::Iter, Error>> + Send + 'a;
}

/// Cursor over stored events.
///
/// [`EventIterator::next`] yields events until it fails with
/// [`Error::NoMoreEvents`]. [`EventIterator::close`] releases resources and
/// may be called at any time, including after exhaustion or an error.
pub trait EventIterator: Send {
    type Data;

    /// # Errors
    ///
    /// [`Error::NoMoreEvents`] at end of stream, [`Error::Serialization`] if a
    /// registered payload cannot be decoded, or a backend error.
    fn next(&mut self) -> impl Future<Output = Result<Event<Self::Data>, Error>> + Send + '_;

    fn close(&mut self);
}

/// Stores whose global versions form one total order readable as a feed.
pub trait GloballyOrderedStore: EventStore {
    /// Up to `count` events with `global_version >= start`, in commit order.
    ///
    /// Events whose payload is not registered are skipped, but still count
    /// as consumed positions.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if a registered payload cannot be decoded, or
    /// a backend error.
    fn global_events(
        &self,
        start: Version,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Event<Self::Data>>, Error>> + Send + '_;
}

/// Identifies one aggregate's stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub aggregate_type: String,
    pub aggregate_id: String,
}

impl StreamKey {
    pub fn new(aggregate_type: impl Into<String>, aggregate_id: impl Into<String>) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
        }
    }

    /// Key of the stream an event belongs to.
    pub fn of<D>(event: &Event<D>) -> Self {
        Self::new(event.aggregate_type.clone(), event.aggregate_id.clone())
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_id)
    }
}

/// Drain a cursor, racing every step against `ctx`.
///
/// The cursor is closed on every path. Nothing read is returned if the
/// context finishes first.
pub(crate) async fn drain<I>(ctx: &Context, mut iter: I) -> Result<Vec<Event<I::Data>>, Error>
where
    I: EventIterator,
{
    let mut events = Vec::new();
    let result = loop {
        match ctx.run(iter.next()).await {
            Ok(event) => events.push(event),
            Err(Error::NoMoreEvents) => break Ok(events),
            Err(err) => break Err(err),
        }
    };
    iter.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        remaining: u64,
        closed: bool,
    }

    impl EventIterator for Counting {
        type Data = ();

        fn next(&mut self) -> impl Future<Output = Result<Event<()>, Error>> + Send + '_ {
            let result = if self.closed || self.remaining == 0 {
                Err(Error::NoMoreEvents)
            } else {
                self.remaining -= 1;
                Ok(Event {
                    aggregate_id: "a".into(),
                    version: 3 - self.remaining,
                    global_version: 0,
                    aggregate_type: "T".into(),
                    timestamp: chrono::Utc::now(),
                    data: (),
                    metadata: None,
                })
            };
            std::future::ready(result)
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn stream_key_display() {
        assert_eq!(StreamKey::new("Person", "p-1").to_string(), "Person/p-1");
    }

    #[tokio::test]
    async fn drain_collects_until_exhausted() {
        let iter = Counting {
            remaining: 3,
            closed: false,
        };
        let events = drain(&Context::background(), iter).await.unwrap();
        let versions: Vec<_> = events.iter().map(|e| e.version).collect();
        assert_eq!(versions, [1, 2, 3]);
    }

    #[tokio::test]
    async fn drain_discards_partial_reads_on_cancel() {
        let (ctx, cancel) = Context::with_cancel();
        cancel.cancel();
        let iter = Counting {
            remaining: 3,
            closed: false,
        };
        assert!(matches!(drain(&ctx, iter).await, Err(Error::Cancelled)));
    }
}
