//! Snapshot support for optimised aggregate loading.
//!
//! Snapshots persist aggregate state at a committed version, so loading only
//! replays the events recorded after it. They are a cache: the event log
//! stays the source of truth. This module provides:
//!
//! - [`Snapshot`] - Point-in-time aggregate state
//! - [`SnapshotStore`] - Trait for snapshot persistence
//! - [`SnapshotAggregate`] - Per-aggregate choice of capture strategy,
//!   [`Fields`] or [`Hooks`]
//! - [`SnapshotHandler`] - Captures and restores aggregates for the
//!   repository
//! - [`inmemory`] - In-memory reference implementation

use std::future::Future;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    aggregate::Aggregate,
    codec::Codec,
    context::Context,
    error::Error,
    event::Version,
};

pub mod inmemory;

/// Point-in-time snapshot of aggregate state.
///
/// `version` and `global_version` are those of the last event folded into
/// `state`. When loading an aggregate, only events after `version` need to be
/// replayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub aggregate_type: String,
    /// Encoded aggregate state.
    pub state: Vec<u8>,
    pub version: Version,
    pub global_version: Version,
}

/// Persistence for the latest snapshot of each aggregate.
pub trait SnapshotStore: Send + Sync {
    /// Load the most recent snapshot for an aggregate.
    ///
    /// Returns `Ok(None)` if no snapshot exists.
    ///
    /// # Errors
    ///
    /// A cancellation error from `ctx`, or a backend error.
    fn get<'a>(
        &'a self,
        ctx: &'a Context,
        id: &'a str,
        aggregate_type: &'a str,
    ) -> impl Future<Output = Result<Option<Snapshot>, Error>> + Send + 'a;

    /// Store a snapshot, replacing any older one for the same aggregate.
    ///
    /// # Errors
    ///
    /// Returns a backend error if persistence fails.
    fn save(&self, snapshot: Snapshot) -> impl Future<Output = Result<(), Error>> + Send + '_;
}

/// How an aggregate's state is written into and read back from a snapshot.
pub trait Capture<A: Aggregate> {
    /// # Errors
    ///
    /// The codec's error if the state cannot be encoded.
    fn marshal<C: Codec>(aggregate: &A, codec: &C) -> Result<Vec<u8>, C::Error>;

    /// Restore domain fields. The aggregate root is left to the caller.
    ///
    /// # Errors
    ///
    /// The codec's error if `state` cannot be decoded.
    fn unmarshal<C: Codec>(aggregate: &mut A, codec: &C, state: &[u8]) -> Result<(), C::Error>;
}

/// Capture the aggregate's own fields with serde.
///
/// The aggregate root must be excluded with `#[serde(skip)]`; it is restored
/// from the snapshot's envelope instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fields;

impl<A> Capture<A> for Fields
where
    A: Aggregate + Serialize + DeserializeOwned,
{
    fn marshal<C: Codec>(aggregate: &A, codec: &C) -> Result<Vec<u8>, C::Error> {
        codec.serialize(aggregate)
    }

    fn unmarshal<C: Codec>(aggregate: &mut A, codec: &C, state: &[u8]) -> Result<(), C::Error> {
        let mut restored: A = codec.deserialize(state)?;
        std::mem::swap(restored.root_mut(), aggregate.root_mut());
        *aggregate = restored;
        Ok(())
    }
}

/// Capture through the aggregate's own [`SnapshotHooks`], for aggregates whose
/// internal fields must not be exposed to generic serialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hooks;

/// Hand-written snapshot encoding.
pub trait SnapshotHooks: Aggregate {
    /// # Errors
    ///
    /// The codec's error if the state cannot be encoded.
    fn marshal_snapshot<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, C::Error>;

    /// # Errors
    ///
    /// The codec's error if `state` cannot be decoded.
    fn unmarshal_snapshot<C: Codec>(&mut self, codec: &C, state: &[u8]) -> Result<(), C::Error>;
}

impl<A: SnapshotHooks> Capture<A> for Hooks {
    fn marshal<C: Codec>(aggregate: &A, codec: &C) -> Result<Vec<u8>, C::Error> {
        aggregate.marshal_snapshot(codec)
    }

    fn unmarshal<C: Codec>(aggregate: &mut A, codec: &C, state: &[u8]) -> Result<(), C::Error> {
        aggregate.unmarshal_snapshot(codec, state)
    }
}

/// Aggregates that can be snapshotted, with the capture strategy chosen once
/// per type.
///
/// `#[derive(Aggregate)]` implements this when given `snapshot = "fields"` or
/// `snapshot = "hooks"`.
pub trait SnapshotAggregate: Aggregate {
    type Capture: Capture<Self>;
}

/// Captures and restores aggregates on behalf of the repository.
#[derive(Clone, Debug)]
pub struct SnapshotHandler<SS, C> {
    store: SS,
    codec: C,
}

impl<SS, C> SnapshotHandler<SS, C>
where
    SS: SnapshotStore,
    C: Codec,
{
    pub const fn new(store: SS, codec: C) -> Self {
        Self { store, codec }
    }

    #[must_use]
    pub const fn store(&self) -> &SS {
        &self.store
    }

    /// Snapshot an aggregate whose events are all saved.
    ///
    /// # Errors
    ///
    /// [`Error::UnsavedEvents`] if the aggregate has unsaved events,
    /// [`Error::EmptyId`] if it has no identity, [`Error::Serialization`] if
    /// the capture fails, or the snapshot store's error.
    #[tracing::instrument(skip_all, fields(aggregate_type = A::TYPE, aggregate_id = aggregate.root().id()))]
    pub async fn save<A: SnapshotAggregate>(&self, aggregate: &A) -> Result<(), Error> {
        let root = aggregate.root();
        if root.unsaved_events() {
            return Err(Error::UnsavedEvents);
        }
        if root.id().is_empty() {
            return Err(Error::EmptyId);
        }

        let state = A::Capture::marshal(aggregate, &self.codec).map_err(Error::serialization)?;
        let snapshot = Snapshot {
            id: root.id().to_string(),
            aggregate_type: A::TYPE.to_string(),
            state,
            version: root.version(),
            global_version: root.global_version(),
        };
        let version = snapshot.version;
        self.store.save(snapshot).await?;
        tracing::debug!(version, "snapshot stored");
        Ok(())
    }

    /// Fetch the latest snapshot without applying it.
    ///
    /// # Errors
    ///
    /// The snapshot store's error.
    pub async fn get(
        &self,
        ctx: &Context,
        id: &str,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>, Error> {
        self.store.get(ctx, id, aggregate_type).await
    }

    /// Restore an aggregate's fields and counters from a snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the state cannot be decoded; the aggregate
    /// root is not modified in that case.
    pub fn restore<A: SnapshotAggregate>(
        &self,
        aggregate: &mut A,
        snapshot: &Snapshot,
    ) -> Result<(), Error> {
        A::Capture::unmarshal(aggregate, &self.codec, &snapshot.state)
            .map_err(Error::serialization)?;
        aggregate
            .root_mut()
            .set_internals(&snapshot.id, snapshot.version, snapshot.global_version);
        Ok(())
    }
}

/// Repository marker for "no snapshot store configured".
///
/// This is the default when
/// [`Repository::with_snapshots`](crate::repository::Repository::with_snapshots)
/// is not called.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSnapshots;
