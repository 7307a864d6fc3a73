//! Domain shared by the integration tests.

#![allow(dead_code)]

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use eventide::{
    Aggregate, AggregateRoot, Apply, DomainEvent, Error, Event, JsonCodec, Serializer, Version,
    context::Context,
    store::{EventStore, inmemory},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DomainEvent)]
pub struct Born {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DomainEvent)]
pub struct AgedOneYear {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Aggregate)]
#[aggregate(
    events(Born, AgedOneYear),
    derives(Debug, PartialEq, Eq),
    snapshot = "fields"
)]
pub struct Person {
    #[serde(skip)]
    root: AggregateRoot<PersonEvent>,
    pub name: String,
    pub age: u32,
}

impl Apply<Born> for Person {
    fn apply(&mut self, event: &Born) {
        self.name.clone_from(&event.name);
    }
}

impl Apply<AgedOneYear> for Person {
    fn apply(&mut self, _event: &AgedOneYear) {
        self.age += 1;
    }
}

impl Person {
    pub fn create(name: &str) -> Result<Self, Error> {
        let mut person = Self::default();
        person.track_change(Born { name: name.into() })?;
        Ok(person)
    }

    pub fn grow_older(&mut self) -> Result<(), Error> {
        self.track_change(AgedOneYear {})
    }
}

pub type Store = inmemory::Store<PersonEvent>;

/// An in-memory store with `Person` registered.
pub fn store() -> Store {
    let store = Store::default();
    store.serializer().register::<Person>();
    store
}

/// Delegates to an in-memory store, recording every read and optionally
/// stalling before it.
#[derive(Clone)]
pub struct Probe {
    pub inner: Store,
    pub reads: Arc<Mutex<Vec<Version>>>,
    pub stall: Option<Duration>,
}

impl Probe {
    pub fn new(inner: Store) -> Self {
        Self {
            inner,
            reads: Arc::default(),
            stall: None,
        }
    }

    pub fn stalling(inner: Store, stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::new(inner)
        }
    }

    pub fn reads(&self) -> Vec<Version> {
        self.reads.lock().unwrap().clone()
    }
}

impl EventStore for Probe {
    type Data = PersonEvent;
    type Codec = JsonCodec;
    type Iter = inmemory::Iter<PersonEvent, JsonCodec>;

    fn serializer(&self) -> &Serializer<PersonEvent, JsonCodec> {
        self.inner.serializer()
    }

    fn save<'a>(
        &'a self,
        events: &'a mut [Event<PersonEvent>],
    ) -> impl Future<Output = Result<(), Error>> + Send + 'a {
        self.inner.save(events)
    }

    fn get<'a>(
        &'a self,
        ctx: &'a Context,
        id: &'a str,
        aggregate_type: &'a str,
        after_version: Version,
    ) -> impl Future<Output = Result<Self::Iter, Error>> + Send + 'a {
        self.reads.lock().unwrap().push(after_version);
        async move {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.inner.get(ctx, id, aggregate_type, after_version).await
        }
    }
}
