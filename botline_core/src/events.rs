//! Named notification channels for a conversation session.
//!
//! Handlers are kept in a single table in registration order and are run
//! synchronously by [`EventHub::emit`]. The table lock is released before
//! any handler runs, so handlers may call back into the hub or the session.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::Activity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Started,
    Stopped,
    Message,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Started,
    Stopped,
    Message { text: String, activity: Activity },
}

impl SessionEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Started => EventKind::Started,
            Self::Stopped => EventKind::Stopped,
            Self::Message { .. } => EventKind::Message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    once: bool,
    handler: Handler,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
pub struct EventHub {
    table: Mutex<Table>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.insert(kind, false, Arc::new(handler))
    }

    /// Register a handler that is dropped after its first delivery.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.insert(kind, true, Arc::new(handler))
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.lock();
        let before = table.subscriptions.len();
        table.subscriptions.retain(|s| s.id != id);
        table.subscriptions.len() != before
    }

    /// Deliver `event` to its channel. Returns the number of handlers run.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let mut table = self.table.lock();
            let handlers = table
                .subscriptions
                .iter()
                .filter(|s| s.kind == kind)
                .map(|s| Arc::clone(&s.handler))
                .collect();
            table.subscriptions.retain(|s| !(s.once && s.kind == kind));
            handlers
        };

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.table
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    fn insert(&self, kind: EventKind, once: bool, handler: Handler) -> SubscriptionId {
        let mut table = self.table.lock();
        table.next_id += 1;
        let id = SubscriptionId(table.next_id);
        table.subscriptions.push(Subscription {
            id,
            kind,
            once,
            handler,
        });
        id
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("EventHub")
            .field("subscriptions", &table.subscriptions.len())
            .finish()
    }
}
