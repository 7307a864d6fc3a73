//! Optimistic concurrency rules for event batches.
//!
//! Every batch handed to an event store must describe one aggregate and carry
//! contiguous versions. [`validate_batch`] checks that shape; the repository
//! runs it before touching the store. [`validate_events`] additionally checks
//! the batch against the version the store currently holds and is meant to be
//! called by backends while they hold their write lock (or inside their
//! transaction), so that the check and the append are atomic.
//!
//! Backends with a native expected-revision append can rely on
//! [`validate_batch`] plus their own conditional write instead.

use thiserror::Error;

use crate::{
    error::Error,
    event::{Event, Version},
};

/// Error indicating that another writer appended to the aggregate's stream
/// since the batch was computed.
///
/// The caller is expected to reload the aggregate, re-apply the domain
/// operation and save again. The core never retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_conflict(.aggregate_type, .aggregate_id, *.expected, *.actual))]
pub struct ConcurrencyConflict {
    pub aggregate_type: String,
    pub aggregate_id: String,
    /// The version the writer assumed the stream was at (`0` for a new
    /// stream).
    pub expected: Version,
    /// The version the store actually holds.
    pub actual: Version,
}

/// Build a human-readable message for a [`ConcurrencyConflict`], including an
/// actionable hint for the caller.
fn format_conflict(
    aggregate_type: &str,
    aggregate_id: &str,
    expected: Version,
    actual: Version,
) -> String {
    if expected == 0 {
        format!(
            "concurrency conflict on {aggregate_type}/{aggregate_id}: expected new stream, found \
             version {actual} (hint: another process created this aggregate; reload and retry)"
        )
    } else {
        format!(
            "concurrency conflict on {aggregate_type}/{aggregate_id}: expected version \
             {expected}, found {actual} (hint: stream was modified; reload and retry)"
        )
    }
}

/// Check that a batch targets a single aggregate and that its versions are
/// contiguous.
///
/// The stored version is not consulted. An empty batch is valid.
///
/// # Errors
///
/// [`Error::MixedAggregate`] if two events disagree on aggregate id or type,
/// [`Error::NonContiguousVersion`] if a version is skipped or repeated.
pub fn validate_batch<D>(events: &[Event<D>]) -> Result<(), Error> {
    let Some((first, rest)) = events.split_first() else {
        return Ok(());
    };

    let mut expected = first.version;
    for event in rest {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(Error::MixedAggregate {
                expected: format!("{}/{}", first.aggregate_type, first.aggregate_id),
                found: format!("{}/{}", event.aggregate_type, event.aggregate_id),
            });
        }
        expected += 1;
        if event.version != expected {
            return Err(Error::NonContiguousVersion {
                expected,
                found: event.version,
            });
        }
    }
    Ok(())
}

/// Check a batch against the version currently persisted for its aggregate.
///
/// In addition to [`validate_batch`], the first event must carry
/// `current_version + 1`.
///
/// # Errors
///
/// Everything [`validate_batch`] returns, plus [`Error::Conflict`] when the
/// first version does not follow `current_version`.
pub fn validate_events<D>(current_version: Version, events: &[Event<D>]) -> Result<(), Error> {
    validate_batch(events)?;
    if let Some(first) = events.first()
        && first.version != current_version + 1
    {
        tracing::debug!(
            aggregate_type = %first.aggregate_type,
            aggregate_id = %first.aggregate_id,
            expected = first.version.saturating_sub(1),
            actual = current_version,
            "version mismatch, rejecting batch"
        );
        return Err(ConcurrencyConflict {
            aggregate_type: first.aggregate_type.clone(),
            aggregate_id: first.aggregate_id.clone(),
            expected: first.version.saturating_sub(1),
            actual: current_version,
        }
        .into());
    }
    Ok(())
}
