//! Notification Bus Module
//!
//! Synchronous fan-out of record-store snapshots to registered listeners.
//! Delivery happens in registration order on the caller's thread. A listener
//! that errors or panics is logged and skipped; the rest still run.
//!
//! Snapshots carry a version stamped under the cache lock. Only one thread
//! delivers at a time and it always hands out the newest pending snapshot,
//! so listeners never see an older view after a newer one. A publisher that
//! finds delivery already under way leaves its snapshot for that thread.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{error, trace};

use crate::cache::RecommendationRecord;

/// Callback invoked with the post-mutation snapshot.
pub type Listener = Arc<dyn Fn(&[RecommendationRecord]) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

#[derive(Default)]
struct Outbox {
    /// Highest version accepted so far
    latest: u64,
    pending: Option<Vec<RecommendationRecord>>,
    draining: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// == Notification Bus ==
#[derive(Default)]
pub struct NotificationBus {
    registry: Arc<Mutex<Registry>>,
    outbox: Mutex<Outbox>,
    versions: AtomicU64,
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.listener_count())
            .field("version", &self.versions.load(Ordering::SeqCst))
            .finish()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    // == Subscribe ==
    /// Registers a listener. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[RecommendationRecord]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        let listener: Listener = Arc::new(listener);
        registry.listeners.push((id, listener));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Stamps the next snapshot version. Call it while holding the lock
    /// that guards the state the snapshot is taken from.
    pub fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::SeqCst) + 1
    }

    // == Publish ==
    /// Offers snapshot `version` for delivery.
    ///
    /// A snapshot older than one already accepted is dropped. If another
    /// call is delivering, the snapshot is queued for it and this returns
    /// immediately. Otherwise this call delivers until nothing is pending.
    ///
    /// # Returns
    /// The number of successful listener calls made by this call.
    pub fn publish(&self, version: u64, snapshot: Vec<RecommendationRecord>) -> usize {
        {
            let mut outbox = lock(&self.outbox);
            if version <= outbox.latest {
                trace!(version, latest = outbox.latest, "dropping superseded snapshot");
                return 0;
            }
            outbox.latest = version;
            outbox.pending = Some(snapshot);
            if outbox.draining {
                return 0;
            }
            outbox.draining = true;
        }

        let mut delivered = 0;
        loop {
            let snapshot = {
                let mut outbox = lock(&self.outbox);
                match outbox.pending.take() {
                    Some(snapshot) => snapshot,
                    None => {
                        outbox.draining = false;
                        break;
                    }
                }
            };
            delivered += self.deliver(&snapshot);
        }
        delivered
    }

    fn deliver(&self, snapshot: &[RecommendationRecord]) -> usize {
        // Listeners run without the registry lock so they may (un)subscribe.
        let listeners: Vec<(u64, Listener)> = lock(&self.registry).listeners.clone();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    error!(listener = id, error = %err, "cache listener failed");
                }
                Err(payload) => {
                    error!(
                        listener = id,
                        panic = panic_message(payload.as_ref()),
                        "cache listener panicked"
                    );
                }
            }
        }

        trace!(delivered, records = snapshot.len(), "published cache snapshot");
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic>"
    }
}

// == Subscription ==
/// Handle for a registered listener. Dropping it unsubscribes.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry)
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}
