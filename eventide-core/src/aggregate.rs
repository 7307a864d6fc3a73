//! Aggregate state machine.
//!
//! An aggregate embeds an [`AggregateRoot`] holding its identity, version
//! counters and the buffer of events tracked since the last save. Domain
//! operations record changes with [`Aggregate::track_change`], which stamps
//! the next version, buffers the event and folds it into the aggregate's own
//! fields through [`Aggregate::transition`]. Rebuilding from storage goes
//! through [`Aggregate::build_from_history`], which folds without buffering.
//!
//! The `#[derive(Aggregate)]` macro generates the event sum type and a
//! `transition` that dispatches each variant to an [`Apply`] impl.

use chrono::Utc;

use crate::{
    codec::Codec,
    config,
    error::Error,
    event::{Event, EventData, Metadata, Version},
    registry::Registrar,
};

/// Identity, version counters and unsaved events of one aggregate instance.
///
/// The root is bookkeeping, not domain state: aggregates that snapshot their
/// fields with serde mark it `#[serde(skip)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateRoot<D> {
    id: String,
    version: Version,
    global_version: Version,
    events: Vec<Event<D>>,
}

impl<D> Default for AggregateRoot<D> {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: 0,
            global_version: 0,
            events: Vec::new(),
        }
    }
}

impl<D> AggregateRoot<D> {
    /// Empty until set explicitly or generated by the first tracked event.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version of the last event folded into the aggregate.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Global version of the last committed event folded into the aggregate.
    #[must_use]
    pub const fn global_version(&self) -> Version {
        self.global_version
    }

    /// Whether events were tracked since the last save.
    #[must_use]
    pub const fn unsaved_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Events tracked since the last save, in version order.
    #[must_use]
    pub fn events(&self) -> &[Event<D>] {
        &self.events
    }

    /// Set the identity.
    ///
    /// # Errors
    ///
    /// [`Error::IdAlreadySet`] if an id is already set or an event has already
    /// been tracked; [`Error::EmptyId`] for an empty id.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<(), Error> {
        if !self.id.is_empty() || !self.events.is_empty() {
            return Err(Error::IdAlreadySet);
        }
        let id = id.into();
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        self.id = id;
        Ok(())
    }

    /// Overwrite identity and counters; used when restoring a snapshot.
    pub(crate) fn set_internals(&mut self, id: &str, version: Version, global_version: Version) {
        id.clone_into(&mut self.id);
        self.version = version;
        self.global_version = global_version;
    }

    /// Forget the buffered events after a successful save.
    pub(crate) fn mark_saved(&mut self, global_version: Version) {
        self.events.clear();
        self.global_version = global_version;
    }
}

/// Event-sourced domain object.
///
/// Implementors own their domain fields plus an [`AggregateRoot`]; the only
/// way domain state changes is by tracking an event.
pub trait Aggregate: Sized {
    /// Aggregate type name recorded on every event and snapshot.
    ///
    /// Combined with the id it identifies a stream, so it must be stable
    /// across releases.
    const TYPE: &'static str;

    /// Sum type over every payload this aggregate produces.
    type Event: EventData;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Fold one event into the aggregate's fields.
    ///
    /// Must be deterministic: replaying the same events yields the same
    /// state. Events carry one of the declared payloads, so every variant is
    /// expected to be handled.
    fn transition(&mut self, event: &Event<Self::Event>);

    /// Declare the payload types this aggregate produces.
    fn register<C: Codec>(events: &mut Registrar<'_, Self::Event, C>);

    /// Record a change without metadata.
    ///
    /// # Errors
    ///
    /// See [`Aggregate::track_change_with_metadata`].
    fn track_change(&mut self, data: impl Into<Self::Event>) -> Result<(), Error> {
        self.track_change_with_metadata(data, None)
    }

    /// Record a change: stamp the next version, buffer the event and fold it
    /// into the aggregate.
    ///
    /// The first tracked event of an aggregate without an id draws one from
    /// the process-wide generator.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyId`] if no id is set and the generator returns an empty
    /// one. The aggregate is left untouched in that case.
    fn track_change_with_metadata(
        &mut self,
        data: impl Into<Self::Event>,
        metadata: Option<Metadata>,
    ) -> Result<(), Error> {
        let root = self.root_mut();
        if root.id.is_empty() {
            let id = config::generate_id();
            if id.is_empty() {
                return Err(Error::EmptyId);
            }
            root.id = id;
        }

        let event = Event {
            aggregate_id: root.id.clone(),
            version: root.version + 1,
            global_version: 0,
            aggregate_type: Self::TYPE.to_string(),
            timestamp: Utc::now(),
            data: data.into(),
            metadata,
        };
        tracing::trace!(
            aggregate_type = Self::TYPE,
            aggregate_id = %event.aggregate_id,
            version = event.version,
            reason = event.reason(),
            "tracking change"
        );

        let version = event.version;
        root.events.push(event.clone());
        self.transition(&event);
        self.root_mut().version = version;
        Ok(())
    }

    /// Fold committed events in ascending version order.
    ///
    /// Identity, version and global version follow the last folded event. The
    /// unsaved buffer is not touched.
    fn build_from_history<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = Event<Self::Event>>,
    {
        for event in events {
            self.transition(&event);
            let root = self.root_mut();
            if root.id != event.aggregate_id {
                root.id = event.aggregate_id;
            }
            root.version = event.version;
            root.global_version = event.global_version;
        }
    }
}

/// Fold one concrete payload into an aggregate.
///
/// The derive macro's generated `transition` calls `Apply<E>` for the variant
/// wrapping `E`.
///
/// ```ignore
/// impl Apply<AgedOneYear> for Person {
///     fn apply(&mut self, _event: &AgedOneYear) {
///         self.age += 1;
///     }
/// }
/// ```
pub trait Apply<E> {
    fn apply(&mut self, event: &E);
}
