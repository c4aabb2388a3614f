use serde::Deserialize;

/// Fan-out strategy used when a snapshot holds more than one subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One delivery task per subscriber, all awaited before `broadcast` returns (default).
    #[default]
    Concurrent,
    /// Enqueues one subscriber after another on the calling task.
    Sequential,
}
