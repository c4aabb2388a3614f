//! The broadcaster: subscribe / broadcast / dispose over a shared registry.
//!
//! One instance is created per message type by the hosting application and
//! handed to producers and subscribers as a cheap clone. Subscribers each get
//! a private unbounded queue, so a slow reader never causes loss for another.
//!
//! ```text
//!   broadcast(m) ──► snapshot ──┬──► enqueue ──► queue(sub-1) ──► Subscriber
//!                               ├──► enqueue ──► queue(sub-2) ──► Subscriber
//!                               └──► enqueue ──► queue(sub-N) ──► Subscriber
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::{self, JoinError};
use tracing::{debug, trace};

use crate::core::delivery_mode::DeliveryMode;
use crate::core::error::{BroadcastError, DeliveryError};
use crate::core::observer::{DeliveryObserver, TracingObserver};
use crate::core::queue::{self, QueueProducer, Subscriber};
use crate::core::registry::SubscriberRegistry;
use crate::core::subscription::{Subscription, SubscriptionId};

/// Counters describing a broadcaster's activity so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Subscriptions currently registered.
    pub active: usize,
    pub subscribed_total: u64,
    /// Unsubscribe requests that reached the broadcaster.
    pub unsubscribed_total: u64,
    pub broadcasts_total: u64,
}

/// State shared by every [`Broadcaster`] clone and every live [`Subscription`].
pub(crate) struct Shared<T> {
    registry: SubscriberRegistry<T>,
    disposed: AtomicBool,
    mode: DeliveryMode,
    observer: Arc<dyn DeliveryObserver>,
    subscribed: AtomicU64,
    unsubscribed: AtomicU64,
    broadcasts: AtomicU64,
}

impl<T> Shared<T> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Removes `id` and closes its queue. Absent ids are ignored.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribed.fetch_add(1, Ordering::Relaxed);
        match self.registry.remove(id) {
            Some(producer) => {
                producer.close();
                debug!(target: "blipcast::broadcaster", subscription_id = %id, "Unsubscribed");
            }
            None => {
                trace!(
                    target: "blipcast::broadcaster",
                    subscription_id = %id,
                    "Unsubscribe for absent subscription ignored"
                );
            }
        }
    }

    fn report(&self, id: SubscriptionId, error: DeliveryError) {
        if error.is_closed() {
            // subscriber left (or broadcaster disposed) after the snapshot was taken
            trace!(target: "blipcast::broadcaster", subscription_id = %id, "Queue closed; message skipped");
            return;
        }
        self.observer.on_delivery_failure(id, &error);
    }
}

/// In-process publish/subscribe broadcaster.
///
/// Cloning is cheap and every clone refers to the same subscriber set.
pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Broadcaster<T> {
    /// Creates a broadcaster with concurrent fan-out and the [`TracingObserver`].
    pub fn new() -> Self {
        BroadcasterBuilder::new().build()
    }

    /// Creates a broadcaster reporting unexpected delivery failures to `observer`.
    pub fn with_observer(observer: Arc<dyn DeliveryObserver>) -> Self {
        BroadcasterBuilder::new().observer(observer).build()
    }

    /// Registers a new subscriber and returns its queue consumer end and handle.
    ///
    /// Fails with [`BroadcastError::Disposed`] once [`dispose`](Self::dispose) has run.
    pub fn subscribe(&self) -> Result<(Subscriber<T>, Subscription<T>), BroadcastError> {
        if self.shared.is_disposed() {
            return Err(BroadcastError::Disposed);
        }

        let id = self.shared.registry.allocate_id();
        let (producer, subscriber) = queue::unbounded(id);
        self.shared.registry.insert(Arc::clone(&producer));

        // dispose() may have swapped the registry out between the check above
        // and the insert; the entry would then never be closed by it.
        if self.shared.is_disposed() {
            self.shared.registry.remove(id);
            producer.close();
            return Err(BroadcastError::Disposed);
        }

        self.shared.subscribed.fetch_add(1, Ordering::Relaxed);
        debug!(target: "blipcast::broadcaster", subscription_id = %id, "Subscribed");
        Ok((subscriber, Subscription::new(id, Arc::clone(&self.shared))))
    }

    /// Disposes the broadcaster: later `subscribe`/`broadcast` calls fail and
    /// every remaining subscriber queue is closed. Only the first call does work.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let displaced = self.shared.registry.take_all();
        for producer in displaced.values() {
            producer.close();
        }
        debug!(
            target: "blipcast::broadcaster",
            closed = displaced.len(),
            "Broadcaster disposed"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.shared.mode
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            active: self.shared.registry.len(),
            subscribed_total: self.shared.subscribed.load(Ordering::Relaxed),
            unsubscribed_total: self.shared.unsubscribed.load(Ordering::Relaxed),
            broadcasts_total: self.shared.broadcasts.load(Ordering::Relaxed),
        }
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Delivers `message` to every subscriber registered when the call starts.
    ///
    /// Resolves once every enqueue attempt of this call has finished. A
    /// closed queue is skipped silently; any other per-subscriber failure is
    /// handed to the observer and never stops delivery to the others.
    ///
    /// With [`DeliveryMode::Concurrent`] the attempts run as tokio tasks; when
    /// polled outside a tokio runtime the call falls back to sequential delivery.
    ///
    /// Dropping the returned future does not retract attempts already dispatched.
    pub async fn broadcast(&self, message: T) -> Result<(), BroadcastError> {
        if self.shared.is_disposed() {
            return Err(BroadcastError::Disposed);
        }
        self.shared.broadcasts.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.shared.registry.snapshot();
        match snapshot.len() {
            0 => {}
            1 => {
                if let Some(producer) = snapshot.values().next() {
                    if let Err(e) = producer.enqueue(message).await {
                        self.shared.report(producer.id(), e);
                    }
                }
            }
            _ => match self.shared.mode {
                // spawning needs a tokio runtime; any other executor gets the sequential loop
                DeliveryMode::Concurrent if Handle::try_current().is_ok() => {
                    self.fan_out_concurrent(snapshot.values(), message).await
                }
                _ => self.fan_out_sequential(snapshot.values(), message).await,
            },
        }
        Ok(())
    }

    async fn fan_out_concurrent<'a>(
        &self,
        producers: impl Iterator<Item = &'a Arc<QueueProducer<T>>>,
        message: T,
    ) {
        // cloned inside each task so a panicking Clone only costs that subscriber
        let message = Arc::new(message);
        let mut attempts = Vec::new();

        for producer in producers {
            let producer = Arc::clone(producer);
            let message = Arc::clone(&message);
            let id = producer.id();
            let handle = task::spawn(async move { producer.enqueue((*message).clone()).await });
            attempts.push((id, handle));
        }

        for (id, handle) in attempts {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.shared.report(id, e),
                Err(e) => self.shared.report(id, join_failure(e)),
            }
        }
    }

    async fn fan_out_sequential<'a>(
        &self,
        producers: impl Iterator<Item = &'a Arc<QueueProducer<T>>>,
        message: T,
    ) {
        for producer in producers {
            let copy = match panic::catch_unwind(AssertUnwindSafe(|| message.clone())) {
                Ok(copy) => copy,
                Err(_) => {
                    self.shared.report(
                        producer.id(),
                        DeliveryError::Unexpected("message clone panicked".into()),
                    );
                    continue;
                }
            };
            if let Err(e) = producer.enqueue(copy).await {
                self.shared.report(producer.id(), e);
            }
        }
    }
}

fn join_failure(error: JoinError) -> DeliveryError {
    if error.is_panic() {
        DeliveryError::Unexpected("delivery task panicked".into())
    } else {
        DeliveryError::Unexpected("delivery task cancelled".into())
    }
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.shared.registry.len())
            .field("mode", &self.shared.mode)
            .field("disposed", &self.shared.is_disposed())
            .finish()
    }
}

/// Builder for [`Broadcaster`] with a custom observer or delivery mode.
pub struct BroadcasterBuilder {
    mode: DeliveryMode,
    observer: Arc<dyn DeliveryObserver>,
}

impl BroadcasterBuilder {
    pub fn new() -> Self {
        Self {
            mode: DeliveryMode::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build<T>(self) -> Broadcaster<T> {
        Broadcaster {
            shared: Arc::new(Shared {
                registry: SubscriberRegistry::new(),
                disposed: AtomicBool::new(false),
                mode: self.mode,
                observer: self.observer,
                subscribed: AtomicU64::new(0),
                unsubscribed: AtomicU64::new(0),
                broadcasts: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for BroadcasterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        failures: Mutex<Vec<(SubscriptionId, DeliveryError)>>,
    }

    impl DeliveryObserver for Recording {
        fn on_delivery_failure(&self, subscription: SubscriptionId, error: &DeliveryError) {
            self.failures.lock().unwrap().push((subscription, error.clone()));
        }
    }

    #[tokio::test]
    async fn broadcast_to_nobody_is_ok() {
        let broadcaster = Broadcaster::<u32>::new();
        broadcaster.broadcast(1).await.unwrap();
        assert_eq!(broadcaster.stats().broadcasts_total, 1);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn single_subscriber_receives_each_message_once_in_order() {
        let broadcaster = Broadcaster::<u32>::new();
        let (rx, _sub) = broadcaster.subscribe().unwrap();

        for i in 0..10 {
            broadcaster.broadcast(i).await.unwrap();
        }
        for i in 0..10 {
            assert_eq!(rx.try_recv(), Some(i));
        }
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn subscriber_added_later_misses_earlier_messages() {
        let broadcaster = Broadcaster::<&'static str>::new();
        let (early, _s1) = broadcaster.subscribe().unwrap();
        broadcaster.broadcast("first").await.unwrap();

        let (late, _s2) = broadcaster.subscribe().unwrap();
        broadcaster.broadcast("second").await.unwrap();

        assert_eq!(early.try_recv(), Some("first"));
        assert_eq!(early.try_recv(), Some("second"));
        assert_eq!(late.try_recv(), Some("second"));
        assert!(late.try_recv().is_none());
    }

    #[tokio::test]
    async fn disposed_broadcaster_rejects_subscribe_and_broadcast() {
        let broadcaster = Broadcaster::<u8>::new();
        let (rx, _sub) = broadcaster.subscribe().unwrap();

        broadcaster.dispose();
        broadcaster.dispose();

        assert!(broadcaster.is_disposed());
        assert_eq!(broadcaster.subscribe().unwrap_err(), BroadcastError::Disposed);
        assert_eq!(broadcaster.broadcast(1).await, Err(BroadcastError::Disposed));
        assert_eq!(rx.recv().await, None);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closed_queue_is_not_reported() {
        let recording = Arc::new(Recording::default());
        let broadcaster = Broadcaster::<u8>::with_observer(recording.clone());
        let (rx1, _s1) = broadcaster.subscribe().unwrap();
        let (rx2, _s2) = broadcaster.subscribe().unwrap();
        drop(rx1);

        broadcaster.broadcast(5).await.unwrap();

        assert_eq!(rx2.try_recv(), Some(5));
        assert!(recording.failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequential_mode_delivers_to_all() {
        let broadcaster = BroadcasterBuilder::new()
            .delivery_mode(DeliveryMode::Sequential)
            .build::<String>();
        let subs: Vec<_> = (0..3).map(|_| broadcaster.subscribe().unwrap()).collect();

        broadcaster.broadcast("hi".to_string()).await.unwrap();

        for (rx, _) in &subs {
            assert_eq!(rx.try_recv().as_deref(), Some("hi"));
        }
    }

    #[test]
    fn concurrent_mode_without_runtime_delivers_sequentially() {
        let broadcaster = Broadcaster::<u32>::new();
        let (rx1, _s1) = broadcaster.subscribe().unwrap();
        let (rx2, _s2) = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.delivery_mode(), DeliveryMode::Concurrent);

        futures::executor::block_on(broadcaster.broadcast(1)).unwrap();

        assert_eq!(rx1.try_recv(), Some(1));
        assert_eq!(rx2.try_recv(), Some(1));
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let broadcaster = Broadcaster::<u8>::new();
        let (rx, sub) = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(rx.recv().await, None);
        assert_eq!(broadcaster.stats().unsubscribed_total, 1);
    }
}
