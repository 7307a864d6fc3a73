//! Type registry and serializer boundary.
//!
//! A [`Serializer`] pairs an encoding strategy ([`Codec`]) with a registry
//! that maps `(aggregate type, reason)` to a [`Factory`] decoding stored bytes
//! into the aggregate's event sum type. Every store read path resolves
//! payloads through [`Serializer::decode`]; pairs nobody registered decode to
//! `None` and are skipped, so code reading a stream written by a newer release
//! ignores event kinds it does not know yet.
//!
//! Registering the same pair twice is last-write-wins.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    aggregate::Aggregate,
    codec::{Codec, JsonCodec},
    error::Error,
    event::DomainEvent,
};

/// Decodes the bytes of one registered payload into the event sum type.
pub type Factory<D, C> = fn(&C, &[u8]) -> Result<D, <C as Codec>::Error>;

type Factories<D, C> = HashMap<String, HashMap<&'static str, Factory<D, C>>>;

fn decode_into<E, D, C>(codec: &C, data: &[u8]) -> Result<D, C::Error>
where
    E: DeserializeOwned + Into<D>,
    C: Codec,
{
    codec.deserialize::<E>(data).map(Into::into)
}

/// Collects the payload types one aggregate declares.
///
/// Handed to [`Aggregate::register`]; the derive macro emits one
/// [`Registrar::event`] call per declared payload.
pub struct Registrar<'a, D, C: Codec> {
    aggregate_type: &'a str,
    factories: Vec<(&'static str, Factory<D, C>)>,
}

impl<'a, D, C: Codec> Registrar<'a, D, C> {
    #[must_use]
    pub const fn new(aggregate_type: &'a str) -> Self {
        Self {
            aggregate_type,
            factories: Vec::new(),
        }
    }

    #[must_use]
    pub const fn aggregate_type(&self) -> &str {
        self.aggregate_type
    }

    /// Declare that the aggregate produces payloads of type `E`.
    pub fn event<E>(&mut self) -> &mut Self
    where
        E: DomainEvent + DeserializeOwned + Into<D>,
    {
        self.factories.push((E::REASON, decode_into::<E, D, C>));
        self
    }

    /// Declare a payload with a hand-written factory.
    pub fn factory(&mut self, reason: &'static str, factory: Factory<D, C>) -> &mut Self {
        self.factories.push((reason, factory));
        self
    }

    fn into_factories(self) -> Vec<(&'static str, Factory<D, C>)> {
        self.factories
    }
}

/// Encoding strategy plus payload registry.
///
/// Clones share one registry, so a store and the repository wrapping it
/// always agree on what is registered.
pub struct Serializer<D, C: Codec = JsonCodec> {
    codec: C,
    factories: Arc<RwLock<Factories<D, C>>>,
}

impl<D, C: Codec> Clone for Serializer<D, C> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            factories: Arc::clone(&self.factories),
        }
    }
}

impl<D, C: Codec + Default> Default for Serializer<D, C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<D, C: Codec> std::fmt::Debug for Serializer<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read();
        f.debug_struct("Serializer")
            .field("aggregate_types", &factories.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<D, C: Codec> Serializer<D, C> {
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Register every payload aggregate `A` declares.
    pub fn register<A>(&self) -> &Self
    where
        A: Aggregate<Event = D>,
    {
        let mut registrar = Registrar::new(A::TYPE);
        A::register(&mut registrar);
        self.register_events(A::TYPE, registrar.into_factories())
    }

    /// Register payload factories for one aggregate type.
    ///
    /// A pair that is already registered is replaced.
    #[tracing::instrument(skip(self, factories))]
    pub fn register_events<I>(&self, aggregate_type: &str, factories: I) -> &Self
    where
        I: IntoIterator<Item = (&'static str, Factory<D, C>)>,
    {
        let mut registry = self.factories.write();
        let entry = registry.entry(aggregate_type.to_string()).or_default();
        for (reason, factory) in factories {
            if entry.insert(reason, factory).is_some() {
                tracing::debug!(reason, "replaced existing payload registration");
            } else {
                tracing::trace!(reason, "registered payload");
            }
        }
        drop(registry);
        self
    }

    /// Look up the factory for a stored payload.
    #[must_use]
    pub fn type_of(&self, aggregate_type: &str, reason: &str) -> Option<Factory<D, C>> {
        self.factories
            .read()
            .get(aggregate_type)
            .and_then(|reasons| reasons.get(reason))
            .copied()
    }

    #[must_use]
    pub fn is_registered(&self, aggregate_type: &str, reason: &str) -> bool {
        self.type_of(aggregate_type, reason).is_some()
    }

    /// Decode a stored payload, or `Ok(None)` when the pair is unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if a registered factory rejects the
    /// bytes.
    pub fn decode(
        &self,
        aggregate_type: &str,
        reason: &str,
        data: &[u8],
    ) -> Result<Option<D>, Error> {
        let Some(factory) = self.type_of(aggregate_type, reason) else {
            return Ok(None);
        };
        factory(&self.codec, data)
            .map(Some)
            .map_err(Error::serialization)
    }

    /// Encode a value with the configured codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] carrying the codec's error.
    pub fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        self.codec.serialize(value).map_err(Error::serialization)
    }

    /// Decode a value with the configured codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] carrying the codec's error.
    pub fn unmarshal<T>(&self, data: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        self.codec.deserialize(data).map_err(Error::serialization)
    }
}
