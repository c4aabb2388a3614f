//! Example publisher/subscriber jobs driving a single broadcaster.
//!
//! Used by the `blipcast` binary and the benchmarks. Each subscriber job
//! drains its own queue until the broadcaster closes it and checks that
//! messages from any one publisher arrive in the order they were sent.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::WorkloadConfig;
use crate::core::{BroadcastError, Broadcaster, Subscriber, Subscription, SubscriptionId};

/// Message type carried by the workload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub publisher: usize,
    pub seq: u64,
    pub sent_at: Instant,
}

#[derive(Debug, Clone)]
pub struct SubscriberReport {
    pub id: SubscriptionId,
    pub received: u64,
    pub order_violations: u64,
    /// Disposed its own subscription before the broadcaster shut down.
    pub left_early: bool,
    total_latency: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub published: u64,
    pub delivered: u64,
    pub order_violations: u64,
    pub per_subscriber: Vec<SubscriberReport>,
    pub elapsed: Duration,
    pub mean_latency: Duration,
}

impl WorkloadReport {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.delivered as f64 / secs
    }
}

/// Runs `cfg` against `broadcaster` and disposes it once every publisher is done.
pub async fn run(
    broadcaster: Broadcaster<Envelope>,
    cfg: &WorkloadConfig,
) -> anyhow::Result<WorkloadReport> {
    let expected = cfg
        .publishers
        .checked_mul(cfg.messages_per_publisher)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "workload too large: {} publishers x {} messages overflows",
                cfg.publishers,
                cfg.messages_per_publisher
            )
        })? as u64;
    let mut subscriber_jobs = Vec::with_capacity(cfg.subscribers);

    for index in 0..cfg.subscribers {
        let (inbox, subscription) = broadcaster.subscribe()?;
        let leave_after = match cfg.unsubscribe_every {
            Some(n) if n > 0 && index % n == 0 => Some(expected / 2),
            _ => None,
        };
        subscriber_jobs.push(tokio::spawn(subscriber_job(
            inbox,
            subscription,
            cfg.publishers,
            leave_after,
        )));
    }

    let started = Instant::now();
    let publisher_jobs: Vec<JoinHandle<Result<u64, BroadcastError>>> = (0..cfg.publishers)
        .map(|publisher| {
            let broadcaster = broadcaster.clone();
            let count = cfg.messages_per_publisher;
            tokio::spawn(publisher_job(broadcaster, publisher, count))
        })
        .collect();

    let mut published = 0;
    for job in publisher_jobs {
        published += job.await??;
    }

    // closes every remaining queue; subscriber jobs finish once drained
    broadcaster.dispose();

    let mut per_subscriber = Vec::with_capacity(subscriber_jobs.len());
    for job in subscriber_jobs {
        per_subscriber.push(job.await?);
    }
    let elapsed = started.elapsed();

    let delivered: u64 = per_subscriber.iter().map(|s| s.received).sum();
    let order_violations = per_subscriber.iter().map(|s| s.order_violations).sum();
    let total_latency: Duration = per_subscriber.iter().map(|s| s.total_latency).sum();
    let mean_latency = if delivered == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((total_latency.as_nanos() / u128::from(delivered)) as u64)
    };

    let report = WorkloadReport {
        published,
        delivered,
        order_violations,
        per_subscriber,
        elapsed,
        mean_latency,
    };
    info!(
        target: "blipcast::workload",
        published = report.published,
        delivered = report.delivered,
        order_violations = report.order_violations,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Workload finished"
    );
    Ok(report)
}

async fn publisher_job(
    broadcaster: Broadcaster<Envelope>,
    publisher: usize,
    count: usize,
) -> Result<u64, BroadcastError> {
    for seq in 0..count as u64 {
        broadcaster
            .broadcast(Envelope {
                publisher,
                seq,
                sent_at: Instant::now(),
            })
            .await?;
    }
    debug!(target: "blipcast::workload", publisher, count, "Publisher done");
    Ok(count as u64)
}

async fn subscriber_job(
    inbox: Subscriber<Envelope>,
    subscription: Subscription<Envelope>,
    publishers: usize,
    leave_after: Option<u64>,
) -> SubscriberReport {
    let mut last_seq: Vec<Option<u64>> = vec![None; publishers];
    let mut report = SubscriberReport {
        id: subscription.id(),
        received: 0,
        order_violations: 0,
        left_early: false,
        total_latency: Duration::ZERO,
    };

    while let Some(envelope) = inbox.recv().await {
        report.received += 1;
        report.total_latency += envelope.sent_at.elapsed();

        if let Some(slot) = last_seq.get_mut(envelope.publisher) {
            if slot.is_some_and(|prev| prev >= envelope.seq) {
                report.order_violations += 1;
            }
            *slot = Some(envelope.seq);
        }

        if leave_after.is_some_and(|n| report.received >= n) && !subscription.is_disposed() {
            // keep draining: the queue ends once it is closed and empty
            subscription.dispose();
            report.left_early = true;
        }
    }

    debug!(
        target: "blipcast::workload",
        subscription_id = %report.id,
        received = report.received,
        "Subscriber drained"
    );
    report
}
