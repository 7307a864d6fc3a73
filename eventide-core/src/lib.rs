//! Core traits and types for the Eventide event-sourcing library.
//!
//! This crate provides the foundational abstractions for event sourcing:
//!
//! - [`event`] - The event envelope and payload traits (`Event`, `DomainEvent`, `EventData`)
//! - [`aggregate`] - Aggregate state machine (`Aggregate`, `AggregateRoot`, `Apply`)
//! - [`registry`] - Payload registry and codec front-end (`Serializer`)
//! - [`codec`] - Byte encodings (`JsonCodec`, `MessagePackCodec`)
//! - [`concurrency`] - Batch validation and optimistic conflicts
//! - [`store`] - Event persistence abstraction (`EventStore`, `EventIterator`)
//! - [`snapshot`] - Snapshot storage and capture (`SnapshotStore`, `SnapshotHandler`)
//! - [`subscription`] - In-process fan-out of committed events
//! - [`repository`] - Aggregate lifecycle (`Repository`)
//! - [`context`] - Cancellation and deadlines for reads
//! - [`config`] - Process-wide aggregate id generation
//!
//! # Example
//!
//! ```
//! use eventide_core::{event::DomainEvent, repository::Repository, store::inmemory};
//!
//! #[derive(Clone, serde::Serialize)]
//! struct Pinged;
//!
//! impl DomainEvent for Pinged {
//!     const REASON: &'static str = "Pinged";
//! }
//!
//! // Create an in-memory store and repository
//! let store: inmemory::Store<Pinged> = inmemory::Store::default();
//! let repo = Repository::new(store);
//! assert!(repo.subscriptions().is_empty());
//! ```
//!
//! Most users should depend on the [`eventide`](https://docs.rs/eventide) crate,
//! which re-exports these types with a cleaner API surface.

pub mod aggregate;
pub mod codec;
pub mod concurrency;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod registry;
pub mod repository;
pub mod snapshot;
pub mod store;
pub mod subscription;



pub use error::{BoxError, Error};
