//! In-memory snapshot store implementation.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{Snapshot, SnapshotStore};
use crate::{context::Context, error::Error, store::StreamKey};

type SharedSnapshots = Arc<RwLock<HashMap<StreamKey, Snapshot>>>;

/// In-memory snapshot store keeping the latest snapshot per aggregate.
///
/// This is a reference implementation suitable for testing and development.
/// Production systems should implement [`SnapshotStore`] with durable storage.
///
/// A snapshot older than the one already held is ignored, so late writers
/// cannot roll the cache back.
///
/// # Example
///
/// ```ignore
/// use eventide::{Repository, snapshot, store};
///
/// let repo = Repository::new(store::inmemory::Store::default())
///     .with_snapshots(snapshot::inmemory::Store::new());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Store {
    snapshots: SharedSnapshots,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregates with a stored snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for Store {
    #[tracing::instrument(skip(self, ctx))]
    async fn get(
        &self,
        ctx: &Context,
        id: &str,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>, Error> {
        ctx.check()?;
        let key = StreamKey::new(aggregate_type, id);
        let snapshot = self.snapshots.read().get(&key).cloned();
        tracing::trace!(found = snapshot.is_some(), "snapshot lookup");
        Ok(snapshot)
    }

    #[tracing::instrument(skip(self, snapshot), fields(aggregate_type = %snapshot.aggregate_type, aggregate_id = %snapshot.id, version = snapshot.version))]
    async fn save(&self, snapshot: Snapshot) -> Result<(), Error> {
        let key = StreamKey::new(snapshot.aggregate_type.clone(), snapshot.id.clone());
        let stored = {
            let mut snapshots = self.snapshots.write();
            match snapshots.get(&key) {
                Some(existing) if existing.version > snapshot.version => false,
                _ => {
                    snapshots.insert(key, snapshot);
                    true
                }
            }
        };
        tracing::debug!(stored, "snapshot offered to store");
        Ok(())
    }
}
