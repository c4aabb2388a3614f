//! BlipCast – an in-process publish/subscribe broadcaster.
//!
//! This crate exports
//!  * `core`     – the broadcaster: subscriber registry, per-subscriber queues,
//!                 subscription handles and the fan-out path
//!  * `workload` – example publisher/subscriber jobs driving one broadcaster
//!  * `config`   – TOML-driven settings for the workload driver
//!  * `logging`  – `tracing` subscriber setup
//!
//! ```no_run
//! use blipcast::Broadcaster;
//!
//! # async fn demo() -> Result<(), blipcast::BroadcastError> {
//! let broadcaster = Broadcaster::<String>::new();
//! let (inbox, subscription) = broadcaster.subscribe()?;
//!
//! broadcaster.broadcast("hello".to_string()).await?;
//! assert_eq!(inbox.recv().await.as_deref(), Some("hello"));
//!
//! subscription.dispose();
//! broadcaster.dispose();
//! # Ok(())
//! # }
//! ```

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;
pub mod workload;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use crate::config::{load_config, Config};
pub use crate::core::{
    BroadcastError, BroadcastStats, Broadcaster, BroadcasterBuilder, DeliveryError,
    DeliveryMode, DeliveryObserver, Subscriber, Subscription, SubscriptionId, TracingObserver,
};
