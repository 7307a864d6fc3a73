//! In-process subscriptions to committed events.
//!
//! The repository publishes every committed batch here, synchronously and in
//! version order, before `save` returns. There is no backlog: a subscriber
//! only sees batches committed while it is registered. A slow handler delays
//! the remaining handlers and the caller of `save`; handlers that do heavy
//! work should hand it off themselves.
//!
//! ```ignore
//! let subscription = repository.subscribe(Filter::aggregate_type("Person"), |event| {
//!     println!("{} v{}", event.aggregate_id, event.version);
//! });
//! // ...
//! subscription.close();
//! ```

use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::RwLock;

use crate::event::{Event, EventData};

/// Which committed events a subscription receives.
///
/// Filters are not exclusive: an event is delivered to every subscription
/// whose filter matches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Every event.
    All,
    /// Events of one aggregate type.
    AggregateType(String),
    /// Events of one aggregate instance.
    Aggregate { aggregate_type: String, id: String },
    /// Events carrying one of the named payloads, optionally restricted to
    /// one aggregate type.
    Events {
        aggregate_type: Option<String>,
        reasons: Vec<String>,
    },
}

impl Filter {
    #[must_use]
    pub const fn all() -> Self {
        Self::All
    }

    pub fn aggregate_type(aggregate_type: impl Into<String>) -> Self {
        Self::AggregateType(aggregate_type.into())
    }

    pub fn aggregate(aggregate_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Aggregate {
            aggregate_type: aggregate_type.into(),
            id: id.into(),
        }
    }

    /// Events carrying any of `reasons`, from any aggregate type.
    pub fn events<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Events {
            aggregate_type: None,
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    /// Events carrying any of `reasons`, from one aggregate type.
    pub fn named<I, S>(aggregate_type: impl Into<String>, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Events {
            aggregate_type: Some(aggregate_type.into()),
            reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches<D: EventData>(&self, event: &Event<D>) -> bool {
        match self {
            Self::All => true,
            Self::AggregateType(aggregate_type) => event.aggregate_type == *aggregate_type,
            Self::Aggregate { aggregate_type, id } => {
                event.aggregate_type == *aggregate_type && event.aggregate_id == *id
            }
            Self::Events {
                aggregate_type,
                reasons,
            } => {
                aggregate_type
                    .as_ref()
                    .is_none_or(|t| event.aggregate_type == *t)
                    && reasons.iter().any(|reason| reason == event.reason())
            }
        }
    }
}

type Handler<D> = Arc<dyn Fn(&Event<D>) + Send + Sync>;

struct Entry<D> {
    id: u64,
    filter: Filter,
    handler: Handler<D>,
    closed: Arc<AtomicBool>,
}

impl<D> Clone for Entry<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter.clone(),
            handler: Arc::clone(&self.handler),
            closed: Arc::clone(&self.closed),
        }
    }
}

type Entries<D> = RwLock<Vec<Entry<D>>>;

/// Registry of live subscriptions for one repository.
///
/// Clones share the same registry.
pub struct Subscriptions<D> {
    entries: Arc<Entries<D>>,
    next_id: Arc<AtomicU64>,
}

impl<D> Clone for Subscriptions<D> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<D> Default for Subscriptions<D> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<D> Subscriptions<D> {
    /// Number of open subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D> std::fmt::Debug for Subscriptions<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("active", &self.len())
            .finish()
    }
}

impl<D: EventData> Subscriptions<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events matching `filter`.
    ///
    /// The subscription stays active until [`Subscription::close`] is called;
    /// dropping the handle does not close it.
    pub fn subscribe<F>(&self, filter: Filter, handler: F) -> Subscription<D>
    where
        F: Fn(&Event<D>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = Arc::new(AtomicBool::new(false));
        tracing::debug!(subscription = id, ?filter, "subscribed");
        self.entries.write().push(Entry {
            id,
            filter,
            handler: Arc::new(handler),
            closed: Arc::clone(&closed),
        });
        Subscription {
            id,
            closed,
            entries: Arc::downgrade(&self.entries),
        }
    }

    /// Deliver committed events, in order, to every matching subscription.
    ///
    /// The subscriber list is captured once per call and no lock is held
    /// while handlers run, so handlers may subscribe or close subscriptions.
    /// A subscription closed mid-publish receives nothing further.
    pub fn publish(&self, events: &[Event<D>]) {
        let entries: Vec<Entry<D>> = self.entries.read().clone();
        if entries.is_empty() {
            return;
        }
        for event in events {
            for entry in &entries {
                if entry.closed.load(Ordering::Acquire) || !entry.filter.matches(event) {
                    continue;
                }
                tracing::trace!(
                    subscription = entry.id,
                    aggregate_id = %event.aggregate_id,
                    version = event.version,
                    "dispatching event"
                );
                (entry.handler)(event);
            }
        }
    }
}

/// Handle to one registration.
pub struct Subscription<D> {
    id: u64,
    closed: Arc<AtomicBool>,
    entries: Weak<Entries<D>>,
}

impl<D> Subscription<D> {
    /// Stop delivery. Idempotent, and safe to call from inside the handler.
    ///
    /// No publish that starts after this returns invokes the handler. A
    /// publish already running on another thread checks the flag before each
    /// event, so it may still deliver the event it is dispatching.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(entries) = self.entries.upgrade() {
            entries.write().retain(|entry| entry.id != self.id);
        }
        tracing::debug!(subscription = self.id, "subscription closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<D> std::fmt::Debug for Subscription<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
