//! Change Notifications
//!
//! In-process publish/subscribe for user mutations.
//!
//! ## Architecture
//!
//! - **ChangeEvent**: what happened (`insert`, `update`, `delete`) and to which user
//! - **SubscriptionRegistry**: bounded, lossy fan-out to every connected watcher
//! - **watch**: per-client loop moving events from its queue to an [`EventSink`]
//!
//! Writers never wait on watchers. A watcher whose queue is full misses
//! events; nothing is replayed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use roster::notifier::{ChangeKind, SubscriptionRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let registry = Arc::new(SubscriptionRegistry::default());
//! let mut subscription = registry.subscribe("dashboard-1").unwrap();
//!
//! registry.notify_change(ChangeKind::Insert, "0b6f6a1e");
//!
//! let event = subscription.recv().await.unwrap();
//! assert_eq!(event.subject_id, "0b6f6a1e");
//! # }
//! ```

mod delivery;
mod event;
mod registry;

pub use delivery::{new_subscriber_id, watch, EventSink, SinkError, WatchExit};
pub use event::{ChangeEvent, ChangeKind, DEFAULT_QUEUE_CAPACITY};
pub use registry::{NotifierError, NotifierStats, SubscriberId, Subscription, SubscriptionRegistry};
