//! Listener registration and event dispatch.
//!
//! Handlers are keyed either by event kind (collection-level) or by document
//! identifier (per-document). Dispatch copies the matching handlers out of the registry
//! and releases the lock before invoking them, so a handler may subscribe, cancel, or
//! call back into its collection.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use docsync_core::event::{CollectionEvent, EventKind};

/// A registered event handler.
pub type Handler = Arc<dyn Fn(&CollectionEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ListenerKey {
    Event(EventKind),
    Document(String),
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    handlers: HashMap<u64, (ListenerKey, Handler)>,
    keys: HashMap<ListenerKey, HashSet<u64>>,
}

impl ListenerRegistry {
    pub fn subscribe(&mut self, key: ListenerKey, handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        self.keys.entry(key.clone()).or_default().insert(id);
        self.handlers.insert(id, (key, handler));
        id
    }

    /// Removes one handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: u64) -> bool {
        let Some((key, _)) = self.handlers.remove(&id) else {
            return false;
        };

        if let Some(ids) = self.keys.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.keys.remove(&key);
            }
        }
        true
    }

    /// Returns the handlers an event is delivered to, collection-level ones first.
    pub fn handlers_for(&self, event: &CollectionEvent) -> Vec<Handler> {
        let mut handlers = self.collect(&ListenerKey::Event(event.kind()));
        if let Some(id) = event.document_id() {
            handlers.extend(self.collect(&ListenerKey::Document(id.to_string())));
        }
        handlers
    }

    /// Drops every subscription. Identifiers keep counting so stale tokens stay inert.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.keys.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    fn collect(&self, key: &ListenerKey) -> Vec<Handler> {
        let Some(ids) = self.keys.get(key) else {
            return Vec::new();
        };

        let mut ids = ids.iter().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.handlers.get(&id).map(|(_, handler)| handler.clone()))
            .collect()
    }
}

/// Delivers an event to its handlers without holding the registry lock.
pub(crate) fn dispatch(registry: &Mutex<ListenerRegistry>, event: &CollectionEvent) {
    let handlers = registry.lock().handlers_for(event);
    for handler in handlers {
        handler(event);
    }
}

/// Token for a registered handler.
///
/// Dropping the token leaves the handler registered; call [`Subscription::cancel`] to
/// remove it.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<Mutex<ListenerRegistry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Removes the handler. Returns `false` if it was already removed, by an earlier
    /// cancel or by clearing the collection.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.lock().unsubscribe(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
