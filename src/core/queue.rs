//! Per-subscriber delivery queue.
//!
//! Every subscription owns one unbounded FIFO channel. The producer end is
//! shared by all concurrent `broadcast` callers through the registry; the
//! consumer end belongs to the subscriber alone.
//!
//! Closing is explicit and idempotent: the producer end drops its
//! `flume::Sender` out of an [`ArcSwapOption`], so later enqueues fail with
//! [`DeliveryError::Closed`] and the consumer observes disconnection once any
//! in-flight attempts have finished and the queue is drained.

use arc_swap::ArcSwapOption;
use flume::{Receiver, Sender};
use futures::Stream;
use std::fmt;
use std::sync::Arc;

use crate::core::error::DeliveryError;
use crate::core::subscription::SubscriptionId;

/// Creates a fresh unbounded queue for `id`, returning its producer and consumer ends.
pub fn unbounded<T>(id: SubscriptionId) -> (Arc<QueueProducer<T>>, Subscriber<T>) {
    let (tx, rx) = flume::unbounded();
    let producer = Arc::new(QueueProducer {
        id,
        sender: ArcSwapOption::from_pointee(tx),
    });
    (producer, Subscriber { id, receiver: rx })
}

/// Closeable producer end of a subscriber's queue.
pub struct QueueProducer<T> {
    id: SubscriptionId,
    sender: ArcSwapOption<Sender<T>>,
}

impl<T> QueueProducer<T> {
    #[inline(always)]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Enqueues `message`, failing with [`DeliveryError::Closed`] when the queue
    /// was closed or its consumer end was dropped.
    pub async fn enqueue(&self, message: T) -> Result<(), DeliveryError> {
        // load_full: the guard must not be held across the await
        let sender = self.sender.load_full().ok_or(DeliveryError::Closed)?;
        sender
            .send_async(message)
            .await
            .map_err(|_| DeliveryError::Closed)
    }

    /// Closes the queue. Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.sender.swap(None).is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.load().is_none()
    }
}

impl<T> fmt::Debug for QueueProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProducer")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer end of a subscriber's queue.
///
/// Reads yield messages in the order their enqueues were issued; once the
/// queue is closed and drained every read reports completion.
pub struct Subscriber<T> {
    id: SubscriptionId,
    receiver: Receiver<T>,
}

impl<T> Subscriber<T> {
    #[inline(always)]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next message. `None` means the queue is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }

    /// Blocking variant of [`recv`](Self::recv) for consumers living on plain threads.
    pub fn recv_blocking(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Returns a message if one is ready without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// `true` once every producer handle is gone; buffered messages may still be pending.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_disconnected()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Turns the consumer end into a [`Stream`] that ends when the queue is closed and drained.
    pub fn into_stream(self) -> impl Stream<Item = T> + 'static
    where
        T: 'static,
    {
        self.receiver.into_stream()
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}
