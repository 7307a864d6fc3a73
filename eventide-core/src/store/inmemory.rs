//! In-memory event store implementation for testing.
//!
//! This module provides [`Store`], a thread-safe in-memory implementation of
//! [`EventStore`](super::EventStore) suitable for unit tests and examples.
//!
//! One lock guards both the per-aggregate index and the global log, so every
//! commit is serialized. That trivially keeps the version check and the
//! append atomic and makes global versions follow commit order, at the cost of
//! write throughput.
//!
//! # Example
//!
//! ```
//! use eventide_core::{registry::Serializer, store::inmemory};
//!
//! let store: inmemory::Store<serde_json::Value> = inmemory::Store::new(Serializer::default());
//! ```

use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    codec::{Codec, JsonCodec},
    concurrency::validate_events,
    context::Context,
    error::Error,
    event::{Event, EventData, Version},
    registry::Serializer,
    store::{EventIterator, EventStore, GloballyOrderedStore, StreamKey},
};

/// An event as held by the store: payload and metadata in encoded form.
#[derive(Clone, Debug)]
struct Record {
    aggregate_id: String,
    aggregate_type: String,
    version: Version,
    global_version: Version,
    reason: String,
    timestamp: DateTime<Utc>,
    data: Vec<u8>,
    metadata: Option<Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    /// Every committed record; index `i` holds global version `i + 1`.
    log: Vec<Record>,
    /// Positions in `log` of each stream's records, in version order.
    streams: HashMap<StreamKey, Vec<usize>>,
}

impl Inner {
    fn stream_version(&self, key: &StreamKey) -> Version {
        self.streams
            .get(key)
            .and_then(|positions| positions.last())
            .map_or(0, |&position| self.log[position].version)
    }
}

/// In-memory event store that keeps an encoded global log.
///
/// Payloads are encoded on save and decoded through the registry on read,
/// like a durable backend would. Clones share the same log.
pub struct Store<D, C: Codec = JsonCodec> {
    inner: Arc<RwLock<Inner>>,
    serializer: Serializer<D, C>,
}

impl<D, C: Codec> Clone for Store<D, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            serializer: self.serializer.clone(),
        }
    }
}

impl<D, C: Codec + Default> Default for Store<D, C> {
    fn default() -> Self {
        Self::new(Serializer::default())
    }
}

impl<D, C: Codec> Store<D, C> {
    #[must_use]
    pub fn new(serializer: Serializer<D, C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            serializer,
        }
    }

    /// A second view over the same log that decodes with another registry.
    ///
    /// Models an older (or newer) release of an application reading the
    /// streams this store has written.
    #[must_use]
    pub fn reopen<D2, C2: Codec>(&self, serializer: Serializer<D2, C2>) -> Store<D2, C2> {
        Store {
            inner: Arc::clone(&self.inner),
            serializer,
        }
    }

    /// Number of committed events across all streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: EventData, C: Codec> Store<D, C> {
    fn encode(&self, event: &Event<D>) -> Result<Record, Error> {
        Ok(Record {
            aggregate_id: event.aggregate_id.clone(),
            aggregate_type: event.aggregate_type.clone(),
            version: event.version,
            global_version: 0,
            reason: event.reason().to_string(),
            timestamp: event.timestamp,
            data: self.serializer.marshal(&event.data)?,
            metadata: event
                .metadata
                .as_ref()
                .map(|metadata| self.serializer.marshal(metadata))
                .transpose()?,
        })
    }

    fn commit(&self, events: &mut [Event<D>]) -> Result<(), Error> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let key = StreamKey::of(first);

        // Encode everything before taking the lock
        let staged = events
            .iter()
            .map(|event| self.encode(event))
            .collect::<Result<Vec<_>, _>>()?;

        let mut inner = self.inner.write();
        validate_events(inner.stream_version(&key), events)?;

        for (event, mut record) in events.iter_mut().zip(staged) {
            let position = inner.log.len();
            let global_version = position as Version + 1;
            record.global_version = global_version;
            event.global_version = global_version;
            inner.log.push(record);
            inner.streams.entry(key.clone()).or_default().push(position);
        }
        let last_global_version = inner.log.len();
        drop(inner);

        tracing::debug!(
            stream = %key,
            events_appended = events.len(),
            last_global_version,
            "events committed to stream"
        );
        Ok(())
    }
}

fn decode<D, C: Codec>(serializer: &Serializer<D, C>, record: Record) -> Result<Option<Event<D>>, Error> {
    let Some(data) = serializer.decode(&record.aggregate_type, &record.reason, &record.data)? else {
        tracing::trace!(
            aggregate_type = %record.aggregate_type,
            reason = %record.reason,
            version = record.version,
            "skipping unregistered event"
        );
        return Ok(None);
    };
    let metadata = record
        .metadata
        .as_deref()
        .map(|bytes| serializer.unmarshal(bytes))
        .transpose()?;
    Ok(Some(Event {
        aggregate_id: record.aggregate_id,
        version: record.version,
        global_version: record.global_version,
        aggregate_type: record.aggregate_type,
        timestamp: record.timestamp,
        data,
        metadata,
    }))
}

impl<D, C> EventStore for Store<D, C>
where
    D: EventData,
    C: Codec,
{
    type Codec = C;
    type Data = D;
    type Iter = Iter<D, C>;

    fn serializer(&self) -> &Serializer<D, C> {
        &self.serializer
    }

    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    fn save<'a>(
        &'a self,
        events: &'a mut [Event<D>],
    ) -> impl Future<Output = Result<(), Error>> + Send + 'a {
        std::future::ready(self.commit(events))
    }

    #[tracing::instrument(skip(self, ctx))]
    fn get<'a>(
        &'a self,
        ctx: &'a Context,
        id: &'a str,
        aggregate_type: &'a str,
        after_version: Version,
    ) -> impl Future<Output = Result<Iter<D, C>, Error>> + Send + 'a {
        let result = ctx.check().and_then(|()| {
            let key = StreamKey::new(aggregate_type, id);
            let inner = self.inner.read();
            let records: Vec<Record> = inner
                .streams
                .get(&key)
                .into_iter()
                .flatten()
                .map(|&position| &inner.log[position])
                .filter(|record| record.version > after_version)
                .cloned()
                .collect();
            drop(inner);

            if records.is_empty() {
                return Err(Error::NoEvents);
            }
            tracing::trace!(event_count = records.len(), "opened stream cursor");
            Ok(Iter {
                records: records.into_iter(),
                serializer: self.serializer.clone(),
            })
        });
        std::future::ready(result)
    }
}

impl<D, C> GloballyOrderedStore for Store<D, C>
where
    D: EventData,
    C: Codec,
{
    #[tracing::instrument(skip(self))]
    fn global_events(
        &self,
        start: Version,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Event<D>>, Error>> + Send + '_ {
        let records: Vec<Record> = {
            let inner = self.inner.read();
            let from = usize::try_from(start.saturating_sub(1)).unwrap_or(usize::MAX);
            inner.log.iter().skip(from).take(count).cloned().collect()
        };
        let result = records
            .into_iter()
            .filter_map(|record| decode(&self.serializer, record).transpose())
            .collect();
        std::future::ready(result)
    }
}

/// Cursor over a snapshot of one stream taken when it was opened.
pub struct Iter<D, C: Codec> {
    records: std::vec::IntoIter<Record>,
    serializer: Serializer<D, C>,
}

impl<D: EventData, C: Codec> Iter<D, C> {
    fn advance(&mut self) -> Result<Event<D>, Error> {
        for record in self.records.by_ref() {
            if let Some(event) = decode(&self.serializer, record)? {
                return Ok(event);
            }
        }
        Err(Error::NoMoreEvents)
    }
}

impl<D: EventData, C: Codec> EventIterator for Iter<D, C> {
    type Data = D;

    fn next(&mut self) -> impl Future<Output = Result<Event<D>, Error>> + Send + '_ {
        std::future::ready(self.advance())
    }

    fn close(&mut self) {
        self.records = Vec::new().into_iter();
    }
}
