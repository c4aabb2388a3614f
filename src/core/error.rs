use std::fmt;

/// Error surfaced to callers of [`Broadcaster`](crate::core::Broadcaster) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastError {
    /// The broadcaster has been disposed; no new subscriptions or broadcasts are accepted.
    Disposed,
}

impl std::error::Error for BroadcastError {}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BroadcastError::Disposed => write!(f, "Broadcaster has been disposed"),
        }
    }
}

/// Outcome of a single enqueue attempt onto one subscriber's queue.
///
/// Never returned from `broadcast`: `Closed` is swallowed, `Unexpected` goes
/// to the configured [`DeliveryObserver`](crate::core::DeliveryObserver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The queue was closed by its subscription or by broadcaster disposal.
    Closed,
    /// The attempt failed for any other reason (e.g. the delivery task panicked).
    Unexpected(String),
}

impl DeliveryError {
    pub fn is_closed(&self) -> bool {
        matches!(self, DeliveryError::Closed)
    }
}

impl std::error::Error for DeliveryError {}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "Queue is closed"),
            DeliveryError::Unexpected(msg) => write!(f, "Unexpected delivery failure: {msg}"),
        }
    }
}
