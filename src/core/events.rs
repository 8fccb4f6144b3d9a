//! Typed lifecycle signals
//!
//! Contains:
//! - `Listener` trait - for implementing signal listeners
//! - `SignalHub` - stores listeners and dispatches one signal type
//!
//! Each lifecycle signal gets its own `SignalHub`, so subscriptions are
//! typed per signal. Dispatch is synchronous and runs listeners in
//! registration order; successive `emit` calls deliver in emission order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for signal listeners
///
/// Listeners are synchronous. If a listener needs async work (forwarding to
/// a channel, spawning IO), it should hand off to a task rather than block.
pub trait Listener<E>: Send + Sync {
    /// Handle one emitted signal
    fn call(&self, event: &E);
}

/// Implement Listener for closures
impl<E, F> Listener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn call(&self, event: &E) {
        (self)(event)
    }
}

/// Identifies one subscription on a `SignalHub`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Listener registry for a single signal type
///
/// # Example
///
/// ```ignore
/// let hub: SignalHub<String> = SignalHub::new();
/// let id = hub.subscribe(|msg: &String| println!("got {msg}"));
/// hub.emit(&"hello".to_string());
/// hub.unsubscribe(id);
/// ```
pub struct SignalHub<E> {
    listeners: Mutex<Vec<(SubscriberId, Arc<dyn Listener<E>>)>>,
    next_id: AtomicU64,
}

impl<E> SignalHub<E> {
    /// Create a new empty hub
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener, returning its subscription ID
    pub fn subscribe<L: Listener<E> + 'static>(&self, listener: L) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener
    ///
    /// Returns false if the ID was never registered or already removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Dispatch a signal to every listener in registration order
    pub fn emit(&self, event: &E) {
        // Snapshot under the lock so a listener may subscribe/unsubscribe
        // without deadlocking; the snapshot fixes this emission's audience.
        let snapshot: Vec<Arc<dyn Listener<E>>> = {
            let listeners = self.listeners.lock().unwrap();
            listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in snapshot {
            listener.call(event);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for SignalHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for SignalHub<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHub")
            .field("listeners", &self.len())
            .finish()
    }
}
