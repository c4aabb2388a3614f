use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::broadcaster::Shared;

/// Unique identity of one subscription. Never reused within a broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Reserved value marking a disposed handle; never allocated.
    pub(crate) const DISPOSED: u64 = 0;

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Disposable token controlling one subscriber's membership in the registry.
///
/// [`dispose`](Self::dispose) unsubscribes exactly once no matter how many
/// times, or from how many threads, it is called. Dropping the handle
/// disposes it.
pub struct Subscription<T> {
    id: SubscriptionId,
    /// Holds `id` while live, [`SubscriptionId::DISPOSED`] afterwards.
    slot: AtomicU64,
    owner: ArcSwapOption<Shared<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriptionId, owner: Arc<Shared<T>>) -> Self {
        Self {
            id,
            slot: AtomicU64::new(id.0),
            owner: ArcSwapOption::new(Some(owner)),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.load(Ordering::Acquire) == SubscriptionId::DISPOSED
    }

    /// Removes this subscription from its broadcaster and closes its queue.
    ///
    /// Only the caller that swaps the live id out performs the unsubscribe;
    /// every other call is a no-op.
    pub fn dispose(&self) {
        let previous = self.slot.swap(SubscriptionId::DISPOSED, Ordering::AcqRel);
        if previous == SubscriptionId::DISPOSED {
            return;
        }

        if let Some(owner) = self.owner.swap(None) {
            owner.unsubscribe(SubscriptionId(previous));
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
