use tracing::warn;

use crate::core::error::DeliveryError;
use crate::core::subscription::SubscriptionId;

/// Sink for per-subscriber delivery failures other than a closed queue.
///
/// Called from delivery tasks, so implementations must be cheap and must not
/// block. A failure reported here never affects delivery to other subscribers.
pub trait DeliveryObserver: Send + Sync + 'static {
    fn on_delivery_failure(&self, subscription: SubscriptionId, error: &DeliveryError);
}

/// Default observer: logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_delivery_failure(&self, subscription: SubscriptionId, error: &DeliveryError) {
        warn!(
            target: "blipcast::broadcaster",
            subscription_id = %subscription,
            error = %error,
            "Delivery to subscriber failed"
        );
    }
}
