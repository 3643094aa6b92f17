//! Subscribe/notify hub for guard state changes.
//!
//! # Design Decisions
//! - Callbacks run synchronously on the thread that changed the state
//! - A panicking callback is isolated; the rest are still notified
//! - The hub owns no guard state; it only fans out snapshots

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::guard::GuardSnapshot;
use crate::observability::metrics;

type Callback = Arc<dyn Fn(&GuardSnapshot) + Send + Sync>;
type Entries = Mutex<Vec<(u64, Callback)>>;

/// Ordered set of state-change callbacks.
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    entries: Arc<Entries>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&GuardSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).push((id, Arc::new(callback)));
        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every subscriber with `snapshot`, in subscription order.
    ///
    /// The callback list is copied first, so callbacks may subscribe,
    /// unsubscribe or read guard state without deadlocking.
    pub fn notify(&self, snapshot: &GuardSnapshot) {
        let callbacks: Vec<Callback> = lock(&self.entries)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                tracing::warn!("Guard state listener panicked; continuing with remaining listeners");
                metrics::record_listener_panic();
            }
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("len", &self.len()).finish()
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the callback registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    entries: Weak<Entries>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(entries) = self.entries.upgrade() {
            lock(&entries).retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(entries: &Entries) -> std::sync::MutexGuard<'_, Vec<(u64, Callback)>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
