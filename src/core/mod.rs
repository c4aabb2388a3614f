pub mod broadcaster;
pub mod delivery_mode;
pub mod error;
pub mod observer;
pub mod queue;
pub mod registry;
pub mod subscription;

pub use broadcaster::{BroadcastStats, Broadcaster, BroadcasterBuilder};
pub use delivery_mode::DeliveryMode;
pub use error::{BroadcastError, DeliveryError};
pub use observer::{DeliveryObserver, TracingObserver};
pub use queue::{QueueProducer, Subscriber};
pub use subscription::{Subscription, SubscriptionId};
