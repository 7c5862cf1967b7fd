// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory online/offline tracking.
//!
//! The monitor records the last connectivity signal reported by the
//! platform and fans transitions out to subscribers. A positive reading does
//! not promise that the next remote call succeeds; the engine treats any
//! failed call as offline no matter what the monitor says.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;
type Registry = Mutex<BTreeMap<u64, Callback>>;

/// Tracks online/offline transitions.
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    subscribers: Arc<Registry>,
    next_id: AtomicU64,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial reading.
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        ConnectivityMonitor {
            state,
            subscribers: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Last reported connectivity.
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Report a new platform reading. Subscribers are called only when the
    /// reading changes. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::info!("connectivity changed: {}", if online { "online" } else { "offline" });
            // Call outside the lock so callbacks may subscribe or unsubscribe
            let callbacks: Vec<Callback> = lock(&self.subscribers).values().cloned().collect();
            for callback in callbacks {
                callback(online);
            }
        }
        changed
    }

    /// Register a callback for transitions. The callback stays registered
    /// until the returned handle is dropped or unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).insert(id, Arc::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Receiver for async consumers that want to await transitions.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, BTreeMap<u64, Callback>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the callback now.
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
