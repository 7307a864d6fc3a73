//! Aggregate persistence orchestration.
//!
//! `Repository` saves the events an aggregate tracked, rebuilds aggregates
//! from their history and publishes committed events to in-process
//! subscribers.
//!
//! Snapshot support is opt-in via
//! [`with_snapshots`](Repository::with_snapshots), which switches the
//! repository to `Repository<S, SnapshotHandler<_, _>>`. This keeps the
//! default repository lightweight: no snapshot lookups and no capture bounds
//! on aggregates unless snapshots are enabled.

use crate::{
    aggregate::Aggregate,
    concurrency::validate_batch,
    context::Context,
    error::Error,
    event::{Event, Version},
    snapshot::{NoSnapshots, SnapshotAggregate, SnapshotHandler, SnapshotStore},
    store::{EventStore, drain},
    subscription::{Filter, Subscription, Subscriptions},
};

/// Repository over an event store, optionally with snapshots.
///
/// ```
/// use eventide_core::{event::DomainEvent, repository::Repository, store::inmemory};
///
/// #[derive(Clone, serde::Serialize)]
/// struct Opened;
///
/// impl DomainEvent for Opened {
///     const REASON: &'static str = "Opened";
/// }
///
/// let store: inmemory::Store<Opened> = inmemory::Store::default();
/// let repository = Repository::new(store);
/// assert!(repository.subscriptions().is_empty());
/// ```
#[derive(Clone)]
pub struct Repository<S, M = NoSnapshots>
where
    S: EventStore,
{
    store: S,
    snapshots: M,
    subscriptions: Subscriptions<S::Data>,
}

impl<S> Repository<S>
where
    S: EventStore,
{
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            snapshots: NoSnapshots,
            subscriptions: Subscriptions::default(),
        }
    }
}

impl<S, M> Repository<S, M>
where
    S: EventStore,
{
    #[must_use]
    pub const fn event_store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &Subscriptions<S::Data> {
        &self.subscriptions
    }

    /// Enable snapshots backed by `snapshots`.
    ///
    /// Snapshot state is encoded with the event store's codec.
    #[must_use]
    pub fn with_snapshots<SS>(self, snapshots: SS) -> Repository<S, SnapshotHandler<SS, S::Codec>>
    where
        SS: SnapshotStore,
    {
        let codec = self.store.serializer().codec().clone();
        Repository {
            store: self.store,
            snapshots: SnapshotHandler::new(snapshots, codec),
            subscriptions: self.subscriptions,
        }
    }

    /// Register an aggregate's payload types with the store's serializer.
    pub fn register<A>(&self) -> &Self
    where
        A: Aggregate<Event = S::Data>,
    {
        self.store.serializer().register::<A>();
        self
    }

    /// Receive events committed through this repository from now on.
    pub fn subscribe<F>(&self, filter: Filter, handler: F) -> Subscription<S::Data>
    where
        F: Fn(&Event<S::Data>) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(filter, handler)
    }

    /// Persist the events the aggregate tracked since it was loaded.
    ///
    /// On success the unsaved buffer is cleared, the aggregate's global
    /// version follows the last committed event, and every committed event
    /// has been delivered to matching subscribers. On failure the aggregate
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyId`] if the aggregate has no identity,
    /// [`Error::Conflict`] if the stream moved since the aggregate was loaded
    /// (reload, re-apply and save again), or the store's error.
    #[tracing::instrument(skip_all, fields(aggregate_type = A::TYPE, aggregate_id = aggregate.root().id()))]
    pub async fn save<A>(&self, aggregate: &mut A) -> Result<(), Error>
    where
        A: Aggregate<Event = S::Data>,
    {
        let mut events = {
            let root = aggregate.root();
            if root.id().is_empty() {
                return Err(Error::EmptyId);
            }
            if !root.unsaved_events() {
                tracing::trace!("nothing to save");
                return Ok(());
            }
            validate_batch(root.events())?;
            root.events().to_vec()
        };
        self.store.save(&mut events).await?;

        let last_global_version = events.last().map_or(0, |event| event.global_version);
        aggregate.root_mut().mark_saved(last_global_version);
        tracing::debug!(
            event_count = events.len(),
            last_global_version,
            "aggregate saved"
        );

        self.subscriptions.publish(&events);
        Ok(())
    }

    async fn read_events(
        &self,
        ctx: &Context,
        id: &str,
        aggregate_type: &str,
        after_version: Version,
    ) -> Result<Vec<Event<S::Data>>, Error> {
        let iter = ctx
            .run(self.store.get(ctx, id, aggregate_type, after_version))
            .await?;
        drain(ctx, iter).await
    }
}

impl<S> Repository<S, NoSnapshots>
where
    S: EventStore,
{
    /// Rebuild `aggregate` by replaying its stored events.
    ///
    /// # Errors
    ///
    /// See [`Repository::get_with_context`].
    pub async fn get<A>(&self, id: &str, aggregate: &mut A) -> Result<(), Error>
    where
        A: Aggregate<Event = S::Data>,
    {
        self.get_with_context(&Context::background(), id, aggregate)
            .await
    }

    /// Rebuild `aggregate` by replaying its stored events, observing `ctx`.
    ///
    /// The aggregate is only modified once every event has been read, so a
    /// cancelled or failed load leaves it untouched.
    ///
    /// # Errors
    ///
    /// [`Error::NoEvents`] if nothing is stored for the aggregate (or nothing
    /// this release can decode), [`Error::Cancelled`] /
    /// [`Error::DeadlineExceeded`] if `ctx` finishes first, or the store's
    /// error.
    #[tracing::instrument(skip(self, ctx, aggregate), fields(aggregate_type = A::TYPE))]
    pub async fn get_with_context<A>(
        &self,
        ctx: &Context,
        id: &str,
        aggregate: &mut A,
    ) -> Result<(), Error>
    where
        A: Aggregate<Event = S::Data>,
    {
        ctx.check()?;
        let events = self.read_events(ctx, id, A::TYPE, 0).await?;
        ctx.check()?;
        if events.is_empty() {
            return Err(Error::NoEvents);
        }
        tracing::trace!(event_count = events.len(), "replaying history");
        aggregate.build_from_history(events);
        Ok(())
    }

    /// Load a fresh aggregate.
    ///
    /// # Errors
    ///
    /// See [`Repository::get_with_context`].
    pub async fn load<A>(&self, id: &str) -> Result<A, Error>
    where
        A: Aggregate<Event = S::Data> + Default,
    {
        let mut aggregate = A::default();
        self.get(id, &mut aggregate).await?;
        Ok(aggregate)
    }
}

impl<S, SS> Repository<S, SnapshotHandler<SS, S::Codec>>
where
    S: EventStore,
    SS: SnapshotStore,
{
    #[must_use]
    pub const fn snapshot_handler(&self) -> &SnapshotHandler<SS, S::Codec> {
        &self.snapshots
    }

    /// Rebuild `aggregate` from its latest snapshot plus later events.
    ///
    /// # Errors
    ///
    /// See [`Repository::get_with_context`].
    pub async fn get<A>(&self, id: &str, aggregate: &mut A) -> Result<(), Error>
    where
        A: SnapshotAggregate<Event = S::Data>,
    {
        self.get_with_context(&Context::background(), id, aggregate)
            .await
    }

    /// Rebuild `aggregate` from its latest snapshot plus the events recorded
    /// after it, observing `ctx`.
    ///
    /// A snapshot that cannot be loaded is logged and ignored in favour of a
    /// full replay. The aggregate is only modified once every event has been
    /// read, so a cancelled or failed load leaves it untouched.
    ///
    /// # Errors
    ///
    /// [`Error::NoEvents`] if neither a snapshot nor any event exists,
    /// [`Error::Cancelled`] / [`Error::DeadlineExceeded`] if `ctx` finishes
    /// first, [`Error::Serialization`] if the snapshot state cannot be
    /// restored, or the store's error.
    #[tracing::instrument(skip(self, ctx, aggregate), fields(aggregate_type = A::TYPE))]
    pub async fn get_with_context<A>(
        &self,
        ctx: &Context,
        id: &str,
        aggregate: &mut A,
    ) -> Result<(), Error>
    where
        A: SnapshotAggregate<Event = S::Data>,
    {
        ctx.check()?;
        let snapshot = match ctx.run(self.snapshots.get(ctx, id, A::TYPE)).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "failed to load snapshot, falling back to full replay"
                );
                None
            }
        };
        ctx.check()?;

        let after_version = snapshot.as_ref().map_or(0, |snapshot| snapshot.version);
        let events = match self.read_events(ctx, id, A::TYPE, after_version).await {
            Ok(events) => events,
            Err(Error::NoEvents) if snapshot.is_some() => Vec::new(),
            Err(err) => return Err(err),
        };
        ctx.check()?;

        match &snapshot {
            Some(snapshot) => {
                tracing::trace!(
                    snapshot_version = snapshot.version,
                    event_count = events.len(),
                    "restoring from snapshot"
                );
                self.snapshots.restore(aggregate, snapshot)?;
            }
            None if events.is_empty() => return Err(Error::NoEvents),
            None => tracing::trace!(event_count = events.len(), "replaying history"),
        }
        aggregate.build_from_history(events);
        Ok(())
    }

    /// Load a fresh aggregate.
    ///
    /// # Errors
    ///
    /// See [`Repository::get_with_context`].
    pub async fn load<A>(&self, id: &str) -> Result<A, Error>
    where
        A: SnapshotAggregate<Event = S::Data> + Default,
    {
        let mut aggregate = A::default();
        self.get(id, &mut aggregate).await?;
        Ok(aggregate)
    }

    /// Snapshot an aggregate whose events are all saved.
    ///
    /// # Errors
    ///
    /// [`Error::UnsavedEvents`] if the aggregate has unsaved events,
    /// [`Error::EmptyId`] if it has no identity, or the capture or snapshot
    /// store's error.
    pub async fn save_snapshot<A>(&self, aggregate: &A) -> Result<(), Error>
    where
        A: SnapshotAggregate<Event = S::Data>,
    {
        self.snapshots.save(aggregate).await
    }
}
