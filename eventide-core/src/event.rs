//! The immutable event record and the payload marker traits.
//!
//! [`Event`] is the interchange record every store preserves losslessly.
//! Payloads are application types: each concrete payload implements
//! [`DomainEvent`] to declare its reason, and the sum type an aggregate folds
//! over implements [`EventData`] so the reason can be read from an instance.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

/// Per-aggregate sequence number (starts at 1) and store-wide commit
/// sequence number.
pub type Version = u64;

/// Free-form metadata attached to an event.
pub type Metadata = HashMap<String, serde_json::Value>;

/// One recorded state change of one aggregate.
///
/// `global_version` is `0` until the event store commits the event; the store
/// assigns it exactly once. Everything else is fixed when the event is
/// tracked.
#[derive(Clone, Debug, PartialEq)]
pub struct Event<D> {
    pub aggregate_id: String,
    pub version: Version,
    pub global_version: Version,
    pub aggregate_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: D,
    pub metadata: Option<Metadata>,
}

impl<D: EventData> Event<D> {
    /// Name of the payload variant this event carries.
    pub fn reason(&self) -> &'static str {
        self.data.reason()
    }
}

impl<D: Serialize> Event<D> {
    /// Re-decode the payload into another type with a compatible shape.
    ///
    /// Useful for consumers that only know a payload's wire shape, not the
    /// aggregate's event sum type.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload does not fit `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::to_value(&self.data).and_then(serde_json::from_value)
    }
}

/// Marker trait for concrete event payloads.
///
/// [`Self::REASON`] identifies the payload in storage and in subscription
/// filters. The pair `(aggregate type, reason)` must be unique within one
/// serializer registry.
///
/// `#[derive(DomainEvent)]` implements this with the type's own name.
pub trait DomainEvent {
    const REASON: &'static str;
}

/// A payload that can be carried by an [`Event`].
///
/// Implemented automatically for every [`DomainEvent`]; the
/// `#[derive(Aggregate)]` macro implements it for the event enum it
/// generates by delegating to the wrapped payload.
pub trait EventData: Serialize + Clone + Send + Sync + 'static {
    fn reason(&self) -> &'static str;
}

impl<T> EventData for T
where
    T: DomainEvent + Serialize + Clone + Send + Sync + 'static,
{
    fn reason(&self) -> &'static str {
        T::REASON
    }
}
