#![doc = include_str!("../README.md")]

#[cfg(feature = "test-util")]
pub use eventide_core::test;
pub use eventide_core::{
    Error, aggregate,
    aggregate::{Aggregate, AggregateRoot, Apply},
    codec,
    codec::{Codec, JsonCodec},
    concurrency,
    concurrency::ConcurrencyConflict,
    config, context,
    context::{CancelHandle, Context},
    error, event,
    event::{DomainEvent, Event, EventData, Metadata, Version},
    registry,
    registry::{Registrar, Serializer},
    repository,
    repository::Repository,
    subscription,
    subscription::{Filter, Subscription, Subscriptions},
};
// Re-export proc macro derives so consumers only depend on `eventide`.
pub use eventide_macros::{Aggregate, DomainEvent};

pub mod store {

    pub use eventide_core::store::{
        EventIterator, EventStore, GloballyOrderedStore, StreamKey,
    };

    pub use eventide_core::store::inmemory;
}

pub mod snapshot {

    pub use eventide_core::snapshot::{
        Capture, Fields, Hooks, NoSnapshots, Snapshot, SnapshotAggregate,
        SnapshotHandler, SnapshotHooks, SnapshotStore,
    };

    pub use eventide_core::snapshot::inmemory;
}
