//! Error taxonomy shared by aggregates, stores and the repository.
//!
//! Store contracts return [`Error`] directly so that every backend surfaces
//! the same sentinels ([`Error::NoEvents`], [`Error::NoMoreEvents`]) and the
//! same [`ConcurrencyConflict`] regardless of how it detects them.

use thiserror::Error;

use crate::{concurrency::ConcurrencyConflict, event::Version};

/// Boxed error used for failures that originate outside the core.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The aggregate has no identity at save or snapshot time, or the
    /// configured identifier generator produced an empty identifier.
    #[error("aggregate id is empty")]
    EmptyId,
    /// `set_id` was called on an aggregate that already has an identity or
    /// already tracks events.
    #[error("aggregate id can only be set once, before any event is tracked")]
    IdAlreadySet,
    /// A snapshot was requested while the aggregate still holds unsaved
    /// events.
    #[error("aggregate holds unsaved events; save it before taking a snapshot")]
    UnsavedEvents,
    #[error("event batch mixes aggregates: expected {expected}, found {found}")]
    MixedAggregate { expected: String, found: String },
    #[error("event versions are not contiguous: expected {expected}, found {found}")]
    NonContiguousVersion { expected: Version, found: Version },
    #[error(transparent)]
    Conflict(#[from] ConcurrencyConflict),
    /// Nothing is stored for the requested aggregate.
    #[error("no events found for aggregate")]
    NoEvents,
    /// End-of-stream sentinel returned by event iterators.
    #[error("no more events")]
    NoMoreEvents,
    #[error("serialization failed: {0}")]
    Serialization(#[source] BoxError),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("store error: {0}")]
    Store(#[source] BoxError),
}

impl Error {
    /// Wrap an encoding failure.
    pub fn serialization(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Serialization(Box::new(err))
    }

    /// Wrap a backend failure.
    pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Store(Box::new(err))
    }

    /// Whether the error was caused by a cancelled or expired [`Context`].
    ///
    /// [`Context`]: crate::context::Context
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Whether the caller should reload the aggregate and retry.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
