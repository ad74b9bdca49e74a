//! Named-event pub/sub with persistent and one-shot listeners.
//!
//! DESIGN
//! ======
//! Listeners are identified by the [`ListenerId`] returned at registration,
//! never by comparing closures. The table sits behind one `RwLock`:
//! - `emit` snapshots the listener list under the read lock and invokes
//!   listeners with no lock held, so listeners may register, remove or emit
//!   re-entrantly. A listener added during an `emit` is not part of that
//!   emit's snapshot.
//! - A one-shot listener is removed under the write lock before it runs. If
//!   the removal finds it already gone (a concurrent or re-entrant emit won
//!   the race), it is skipped. That makes "fires at most once" hold under
//!   concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// Shared listener callable.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Opaque handle returned by [`EventBus::on`] and [`EventBus::once`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent listener, appended after existing ones.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), false)
    }

    /// Register a listener removed right before its first invocation.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), true)
    }

    fn register(&self, event: &str, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut table = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(event.to_owned())
            .or_default()
            .push(Registration { id, listener, once });
        id
    }

    /// Invoke every listener registered for `event`, in registration order.
    ///
    /// Returns whether any listener was registered when the emit started.
    pub fn emit(&self, event: &str, args: &Value) -> bool {
        let snapshot: Vec<(ListenerId, Listener, bool)> = {
            let table = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            let Some(registrations) = table.get(event) else {
                return false;
            };
            registrations
                .iter()
                .map(|r| (r.id, Arc::clone(&r.listener), r.once))
                .collect()
        };

        if snapshot.is_empty() {
            return false;
        }

        for (id, listener, once) in snapshot {
            if once && !self.remove_listener(event, id) {
                continue;
            }
            listener(args);
        }
        true
    }

    /// Remove one registration. Returns whether it was still registered.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut table = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registrations) = table.get_mut(event) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            table.remove(event);
        }
        removed
    }

    /// Clear one event's listeners, or the whole table when `event` is `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut table = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            Some(event) => {
                table.remove(event);
            }
            None => table.clear(),
        }
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        let table = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        table.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "event_bus_test.rs"]
mod tests;
