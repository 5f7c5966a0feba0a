//! # Events
//!
//! Collections and records each own an [`EventBus`]. Observers subscribe to one
//! [`EventKind`] and receive the matching [`Event`] synchronously, in registration
//! order. Emission always happens after the mutation it reports has been applied
//! and after the owner has released its internal lock, so a handler may freely read
//! (or mutate) the collection that notified it.
//!
//! A handler that panics is logged and skipped; the remaining handlers still run.

use crate::error::RestError;
use crate::model::Model;
use crate::record::Record;
use crate::transport::QueryParams;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Closed set of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeFetch,
    AfterFetch,
    AfterFetchError,
    AfterAdd,
    AfterRemove,
    BeforeSave,
    AfterSave,
    AfterSaveError,
    BeforeDestroy,
    AfterDestroy,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::BeforeFetch,
        EventKind::AfterFetch,
        EventKind::AfterFetchError,
        EventKind::AfterAdd,
        EventKind::AfterRemove,
        EventKind::BeforeSave,
        EventKind::AfterSave,
        EventKind::AfterSaveError,
        EventKind::BeforeDestroy,
        EventKind::AfterDestroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BeforeFetch => "before-fetch",
            EventKind::AfterFetch => "after-fetch",
            EventKind::AfterFetchError => "after-fetch-error",
            EventKind::AfterAdd => "after-add",
            EventKind::AfterRemove => "after-remove",
            EventKind::BeforeSave => "before-save",
            EventKind::AfterSave => "after-save",
            EventKind::AfterSaveError => "after-save-error",
            EventKind::BeforeDestroy => "before-destroy",
            EventKind::AfterDestroy => "after-destroy",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RestError::UnknownEvent(s.to_string()))
    }
}

/// Payload delivered to handlers.
#[derive(Debug, Clone)]
pub enum Event<M: Model> {
    /// A fetch-family request is about to be sent with `query`.
    BeforeFetch { generation: u64, query: QueryParams },
    /// The current cycle was applied; `count` records were fed.
    AfterFetch { generation: u64, count: usize },
    AfterFetchError { generation: u64, error: RestError },
    AfterAdd { record: Record<M>, index: usize },
    AfterRemove { record: Record<M>, index: usize },
    BeforeSave { record: Record<M> },
    AfterSave { record: Record<M> },
    AfterSaveError { record: Record<M>, error: RestError },
    BeforeDestroy { record: Record<M> },
    AfterDestroy { record: Record<M> },
}

impl<M: Model> Event<M> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BeforeFetch { .. } => EventKind::BeforeFetch,
            Event::AfterFetch { .. } => EventKind::AfterFetch,
            Event::AfterFetchError { .. } => EventKind::AfterFetchError,
            Event::AfterAdd { .. } => EventKind::AfterAdd,
            Event::AfterRemove { .. } => EventKind::AfterRemove,
            Event::BeforeSave { .. } => EventKind::BeforeSave,
            Event::AfterSave { .. } => EventKind::AfterSave,
            Event::AfterSaveError { .. } => EventKind::AfterSaveError,
            Event::BeforeDestroy { .. } => EventKind::BeforeDestroy,
            Event::AfterDestroy { .. } => EventKind::AfterDestroy,
        }
    }

    /// The affected record, for record-level events.
    pub fn record(&self) -> Option<&Record<M>> {
        match self {
            Event::AfterAdd { record, .. }
            | Event::AfterRemove { record, .. }
            | Event::BeforeSave { record }
            | Event::AfterSave { record }
            | Event::AfterSaveError { record, .. }
            | Event::BeforeDestroy { record }
            | Event::AfterDestroy { record } => Some(record),
            Event::BeforeFetch { .. } | Event::AfterFetch { .. } | Event::AfterFetchError { .. } => {
                None
            }
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<M> = Arc<dyn Fn(&Event<M>) + Send + Sync>;

struct Listener<M: Model> {
    id: ListenerId,
    kind: EventKind,
    handler: Handler<M>,
}

/// Per-instance observer registry.
pub struct EventBus<M: Model> {
    listeners: Mutex<Vec<Listener<M>>>,
    next_id: AtomicU64,
}

impl<M: Model> Default for EventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> EventBus<M> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&Event<M>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push(Listener {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }

    /// Invokes every handler registered for the event's kind and returns how many
    /// ran. The handler list is snapshotted first, so handlers may subscribe or
    /// unsubscribe while being notified.
    pub fn emit(&self, event: &Event<M>) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler<M>> = self
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| l.handler.clone())
            .collect();

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(event = kind.as_str(), "Event handler panicked");
            }
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Attrs = serde_json::Map<String, serde_json::Value>;

    fn fetched() -> Event<Attrs> {
        Event::AfterFetch {
            generation: 1,
            count: 0,
        }
    }

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "after-ad".parse::<EventKind>(),
            Err(RestError::UnknownEvent("after-ad".into()))
        );
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::<Attrs>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            bus.on(EventKind::AfterFetch, move |_| order.lock().push(n));
        }
        bus.on(EventKind::AfterAdd, |_| panic!("wrong kind"));

        assert_eq!(bus.emit(&fetched()), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_others() {
        let bus = EventBus::<Attrs>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.on(EventKind::AfterFetch, |_| panic!("handler failure"));
        let counter = calls.clone();
        bus.on(EventKind::AfterFetch, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.emit(&fetched()), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_unsubscribes() {
        let bus = EventBus::<Attrs>::new();
        let id = bus.on(EventKind::AfterFetch, |_| {});
        assert_eq!(bus.listener_count(EventKind::AfterFetch), 1);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.emit(&fetched()), 0);
    }
}
