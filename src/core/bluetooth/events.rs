//! Event delivery for connection status changes and heart rate readings
//! Each event stream is an [`EventChannel`] holding a registry of handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// A registered event callback.
pub type EventHandler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Token returned by [`EventChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration<E> {
    id: HandlerId,
    handler: EventHandler<E>,
}

/// Registry of handlers for one kind of event.
///
/// Subscribing is idempotent per handler: registering the same `Arc` again returns
/// the token it already has, so the handler still receives each event once.
/// Every registered handler receives every emitted event exactly once; the order
/// among handlers is unspecified.
pub struct EventChannel<E> {
    handlers: RwLock<Vec<Registration<E>>>,
    next_id: AtomicU64,
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` and returns its token.
    pub fn subscribe(&self, handler: EventHandler<E>) -> HandlerId {
        let mut handlers = self.handlers.write();
        if let Some(existing) = handlers.iter().find(|r| same_handler(&r.handler, &handler)) {
            return existing.id;
        }

        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        handlers.push(Registration { id, handler });
        id
    }

    /// Registers a closure. Each call creates a distinct registration.
    pub fn subscribe_fn<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler))
    }

    /// Removes the handler registered under `id`. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        handlers.len() != before
    }

    /// Delivers `event` to every registered handler.
    ///
    /// Handlers run outside the registry lock and may (un)subscribe from inside the callback.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<EventHandler<E>> = self.handlers.read().iter().map(|r| r.handler.clone()).collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

fn same_handler<E>(a: &EventHandler<E>, b: &EventHandler<E>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
