#[path = "common.rs"]
mod common;

use std::sync::{Arc, Mutex};

use blipcast::{
    BroadcastError, Broadcaster, BroadcasterBuilder, DeliveryError, DeliveryMode,
    DeliveryObserver, SubscriptionId,
};
use futures::StreamExt;

#[tokio::test]
async fn message_is_fanned_out_and_disposed_subscriber_is_closed() {
    common::init_logging();

    let broadcaster = Broadcaster::<String>::new();
    let (c1, _s1) = broadcaster.subscribe().unwrap();
    let (c2, s2) = broadcaster.subscribe().unwrap();
    let (c3, _s3) = broadcaster.subscribe().unwrap();

    broadcaster.broadcast("m1".to_string()).await.unwrap();
    for consumer in [&c1, &c2, &c3] {
        assert_eq!(consumer.recv().await.as_deref(), Some("m1"));
    }

    s2.dispose();
    broadcaster.broadcast("m2".to_string()).await.unwrap();

    assert_eq!(c1.recv().await.as_deref(), Some("m2"));
    assert_eq!(c3.recv().await.as_deref(), Some("m2"));
    assert_eq!(c2.recv().await, None);
    assert!(c2.is_closed());
}

#[tokio::test]
async fn dispose_closes_every_consumer_stream() {
    common::init_logging();

    let broadcaster = Broadcaster::<u32>::new();
    let mut streams = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let (consumer, subscription) = broadcaster.subscribe().unwrap();
        streams.push(Box::pin(consumer.into_stream()));
        handles.push(subscription);
    }

    broadcaster.broadcast(1).await.unwrap();
    broadcaster.broadcast(2).await.unwrap();
    broadcaster.dispose();

    for stream in &mut streams {
        let drained: Vec<u32> = stream.by_ref().collect().await;
        assert_eq!(drained, vec![1, 2]);
    }

    assert_eq!(broadcaster.subscribe().unwrap_err(), BroadcastError::Disposed);
    assert_eq!(broadcaster.broadcast(3).await, Err(BroadcastError::Disposed));

    // handles outliving the broadcaster's shutdown dispose quietly
    for handle in &handles {
        handle.dispose();
        assert!(handle.is_disposed());
    }
}

#[derive(Debug)]
struct Fragile(u32);

static CLONES: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

impl Clone for Fragile {
    fn clone(&self) -> Self {
        if CLONES.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            panic!("first clone fails");
        }
        Fragile(self.0)
    }
}

#[derive(Default)]
struct Recording(Mutex<Vec<(SubscriptionId, DeliveryError)>>);

impl DeliveryObserver for Recording {
    fn on_delivery_failure(&self, subscription: SubscriptionId, error: &DeliveryError) {
        self.0.lock().unwrap().push((subscription, error.clone()));
    }
}

#[tokio::test]
async fn one_failing_attempt_does_not_affect_other_subscribers() {
    common::init_logging();

    let recording = Arc::new(Recording::default());
    let broadcaster = BroadcasterBuilder::new()
        .delivery_mode(DeliveryMode::Concurrent)
        .observer(recording.clone())
        .build::<Fragile>();
    let subs: Vec<_> = (0..3).map(|_| broadcaster.subscribe().unwrap()).collect();

    broadcaster.broadcast(Fragile(9)).await.unwrap();

    let received = subs
        .iter()
        .filter(|(consumer, _)| consumer.try_recv().is_some_and(|m| m.0 == 9))
        .count();
    assert_eq!(received, 2);

    let failures = recording.0.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, DeliveryError::Unexpected(_)));
}

#[derive(Debug)]
struct BrittleOnce(u32);

static BRITTLE_CLONES: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

impl Clone for BrittleOnce {
    fn clone(&self) -> Self {
        if BRITTLE_CLONES.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            panic!("first clone fails");
        }
        BrittleOnce(self.0)
    }
}

#[tokio::test]
async fn sequential_clone_panic_costs_only_one_subscriber() {
    common::init_logging();

    let recording = Arc::new(Recording::default());
    let broadcaster = BroadcasterBuilder::new()
        .delivery_mode(DeliveryMode::Sequential)
        .observer(recording.clone())
        .build::<BrittleOnce>();
    let subs: Vec<_> = (0..3).map(|_| broadcaster.subscribe().unwrap()).collect();

    broadcaster.broadcast(BrittleOnce(4)).await.unwrap();

    let received = subs
        .iter()
        .filter(|(consumer, _)| consumer.try_recv().is_some_and(|m| m.0 == 4))
        .count();
    assert_eq!(received, 2);

    let failures = recording.0.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, DeliveryError::Unexpected(_)));

    // the broadcaster keeps working after the failed attempt
    drop(failures);
    broadcaster.broadcast(BrittleOnce(5)).await.unwrap();
    for (consumer, _) in &subs {
        assert_eq!(consumer.try_recv().map(|m| m.0), Some(5));
    }
}
