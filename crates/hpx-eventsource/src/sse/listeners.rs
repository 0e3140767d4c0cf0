//! Listener registry behind [`EventSource`](super::EventSource).

use std::{
    any::Any,
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::error;

use super::{
    parse::constants::{ERROR_TYPE, MESSAGE_TYPE, OPEN_TYPE},
    types::SseEvent,
};

/// A callback invoked with each dispatched event.
pub type Listener = Arc<dyn Fn(&SseEvent) + Send + Sync>;

/// Identifies a listener added with
/// [`add_event_listener`](Listeners::add_event_listener).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    by_type: HashMap<String, Vec<(ListenerId, Listener)>>,
    on_open: Option<Listener>,
    on_message: Option<Listener>,
    on_error: Option<Listener>,
}

/// Named-event listeners plus the `onopen`/`onmessage`/`onerror` slots.
///
/// Callbacks run outside the lock, so a listener may register or remove
/// listeners (or close the client) while being called. A panicking listener
/// is logged and skipped; the remaining listeners still run.
#[derive(Default)]
pub struct Listeners {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Listeners")
            .field("types", &registry.by_type.keys().collect::<Vec<_>>())
            .field("on_open", &registry.on_open.is_some())
            .field("on_message", &registry.on_message.is_some())
            .field("on_error", &registry.on_error.is_some())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events of `event_type`.
    pub fn add_event_listener(
        &self,
        event_type: impl Into<String>,
        listener: impl Fn(&SseEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .lock()
            .by_type
            .entry(event_type.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let mut removed = false;
        registry.by_type.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(existing, _)| *existing != id);
            removed |= listeners.len() != before;
            !listeners.is_empty()
        });
        removed
    }

    pub fn set_on_open(&self, listener: Option<Listener>) {
        self.registry.lock().on_open = listener;
    }

    pub fn set_on_message(&self, listener: Option<Listener>) {
        self.registry.lock().on_message = listener;
    }

    pub fn set_on_error(&self, listener: Option<Listener>) {
        self.registry.lock().on_error = listener;
    }

    /// Call the listeners of `event`'s type in registration order, then the
    /// matching `on*` slot.
    pub fn dispatch(&self, event: &SseEvent) {
        let event_type = event.event_type();
        let (typed, slot) = {
            let registry = self.registry.lock();
            let typed: Vec<Listener> = registry
                .by_type
                .get(event_type)
                .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default();
            let slot = match event_type {
                OPEN_TYPE => registry.on_open.clone(),
                MESSAGE_TYPE => registry.on_message.clone(),
                ERROR_TYPE => registry.on_error.clone(),
                _ => None,
            };
            (typed, slot)
        };

        for listener in typed.iter().chain(slot.iter()) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                error!(
                    event_type,
                    panic = panic_message(payload.as_ref()),
                    "EventSource listener panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
