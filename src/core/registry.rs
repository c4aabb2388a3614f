//! Subscriber registry.
//!
//! The registry is an immutable `HashMap` snapshot published through an
//! [`ArcSwap`]. Readers (`broadcast`) take a snapshot with a single atomic
//! load and never block. Writers copy the current map, apply their change
//! and publish it with compare-and-swap, retrying from the newer snapshot
//! when another writer won the race.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::queue::QueueProducer;
use crate::core::subscription::SubscriptionId;

/// Identity-keyed map of producer ends.
pub type Entries<T> = HashMap<SubscriptionId, Arc<QueueProducer<T>>>;

/// Point-in-time view of the registry used by one broadcast call.
pub type Snapshot<T> = Arc<Entries<T>>;

pub struct SubscriberRegistry<T> {
    entries: ArcSwap<Entries<T>>,
    next_id: AtomicU64,
}

impl<T> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            // 0 is SubscriptionId::DISPOSED
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh identity. Identities are never reused.
    pub fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Publishes `producer` under its own identity.
    pub fn insert(&self, producer: Arc<QueueProducer<T>>) {
        let id = producer.id();
        self.update(|current| {
            let mut next = current.clone();
            next.insert(id, Arc::clone(&producer));
            Some((next, ()))
        });
    }

    /// Removes `id`, returning its producer end if this call removed it.
    ///
    /// An absent identity leaves the published snapshot untouched.
    pub fn remove(&self, id: SubscriptionId) -> Option<Arc<QueueProducer<T>>> {
        self.update(|current| {
            let mut next = current.clone();
            let removed = next.remove(&id)?;
            Some((next, removed))
        })
    }

    /// Current snapshot; later inserts and removals do not affect it.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.entries.load_full()
    }

    /// Swaps in an empty map and returns everything that was registered.
    pub fn take_all(&self) -> Snapshot<T> {
        self.entries.swap(Arc::new(HashMap::new()))
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.load().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// CAS retry loop. `apply` returns `None` to leave the registry unchanged.
    fn update<R>(&self, mut apply: impl FnMut(&Entries<T>) -> Option<(Entries<T>, R)>) -> Option<R> {
        let mut current = self.entries.load();
        loop {
            let (next, result) = apply(&current)?;
            let previous = self.entries.compare_and_swap(&*current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &*current) {
                return Some(result);
            }
            current = previous;
        }
    }
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
