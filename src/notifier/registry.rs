//! Subscription Registry
//!
//! Owns every watcher's delivery queue and fans change events out to them.
//!
//! All map mutations and every broadcast run under one `std::sync::Mutex`.
//! The lock is never held across an await: broadcasts use `try_send`, so a
//! full queue drops the event for that subscriber instead of blocking the
//! writer. Because the send side of each queue only lives inside the map,
//! closing a queue (removing its sender) can never race a send into it.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use super::event::{ChangeEvent, ChangeKind, DEFAULT_QUEUE_CAPACITY};

/// Unique identifier for one watching client
pub type SubscriberId = String;

/// Errors surfaced by the notification subsystem
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Subscriber already registered: {0}")]
    DuplicateSubscriber(SubscriberId),

    #[error("Notifier has been shut down")]
    RegistryClosed,

    #[error("Failed to deliver change event: {0}")]
    Delivery(String),
}

/// Point-in-time counters for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct NotifierStats {
    pub subscribers: usize,
    pub queue_capacity: usize,
    pub events_broadcast: u64,
    pub deliveries_dropped: u64,
    pub closed: bool,
}

struct Registration {
    /// Distinguishes this registration from a later one reusing the same id
    token: u64,
    sender: mpsc::Sender<ChangeEvent>,
}

#[derive(Default)]
struct RegistryState {
    subscribers: HashMap<SubscriberId, Registration>,
    next_token: u64,
    closed: bool,
}

/// Process-wide fan-out of change events to bounded per-subscriber queues
pub struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
    capacity: usize,
    events_broadcast: AtomicU64,
    deliveries_dropped: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create a registry whose queues hold `capacity` events each
    ///
    /// A capacity of zero is raised to one; tokio's bounded channels
    /// need at least one slot.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            capacity: capacity.max(1),
            events_broadcast: AtomicU64::new(0),
            deliveries_dropped: AtomicU64::new(0),
        }
    }

    // The state is only mutated by non-panicking code, so a poisoned lock
    // still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber and hand back the receive side of its queue
    ///
    /// Fails if `id` is already registered or the registry has been shut down.
    /// The existing registration is left untouched on a duplicate.
    pub fn subscribe(
        self: &Arc<Self>,
        id: impl Into<SubscriberId>,
    ) -> Result<Subscription, NotifierError> {
        let id = id.into();
        let mut state = self.lock();

        if state.closed {
            return Err(NotifierError::RegistryClosed);
        }
        if state.subscribers.contains_key(&id) {
            return Err(NotifierError::DuplicateSubscriber(id));
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        let token = state.next_token;
        state.next_token += 1;
        state
            .subscribers
            .insert(id.clone(), Registration { token, sender });
        let total = state.subscribers.len();
        drop(state);

        tracing::info!(subscriber_id = %id, subscribers = total, "Subscriber added");

        Ok(Subscription {
            id,
            token,
            receiver,
            registry: Arc::clone(self),
        })
    }

    /// Remove a subscriber and close its queue
    ///
    /// Unknown ids are ignored. Returns whether a registration was removed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.lock().subscribers.remove(id).is_some();
        if removed {
            tracing::info!(subscriber_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Remove `id` only if it still belongs to the registration `token`
    fn release(&self, id: &str, token: u64) {
        let mut state = self.lock();
        let owned = state
            .subscribers
            .get(id)
            .map(|registration| registration.token == token)
            .unwrap_or(false);
        if owned {
            state.subscribers.remove(id);
            drop(state);
            tracing::info!(subscriber_id = %id, "Subscriber removed");
        }
    }

    /// Offer `event` to every current subscriber without waiting
    ///
    /// Subscribers whose queue is full miss this event.
    pub fn broadcast(&self, event: ChangeEvent) {
        tracing::debug!(
            operation = %event.kind,
            user_id = %event.subject_id,
            "Broadcasting change event"
        );
        self.events_broadcast.fetch_add(1, Ordering::Relaxed);

        let state = self.lock();
        for (id, registration) in state.subscribers.iter() {
            match registration.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.deliveries_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        subscriber_id = %id,
                        capacity = self.capacity,
                        "Subscriber queue full, dropping change event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::trace!(subscriber_id = %id, "Subscriber receiver already gone");
                }
            }
        }
    }

    /// Build and broadcast the event for a committed mutation
    pub fn notify_change(&self, kind: ChangeKind, subject_id: impl Into<String>) {
        self.broadcast(ChangeEvent::new(kind, subject_id));
    }

    /// Close every queue and refuse further subscriptions
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let closed = state.subscribers.len();
        state.subscribers.clear();
        state.closed = true;
        drop(state);

        tracing::info!(closed_subscribers = closed, "Notifier shut down");
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().subscribers.contains_key(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> NotifierStats {
        let (subscribers, closed) = {
            let state = self.lock();
            (state.subscribers.len(), state.closed)
        };

        NotifierStats {
            subscribers,
            queue_capacity: self.capacity,
            events_broadcast: self.events_broadcast.load(Ordering::Relaxed),
            deliveries_dropped: self.deliveries_dropped.load(Ordering::Relaxed),
            closed,
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Receive-only view of one subscriber's queue
///
/// Dropping it unsubscribes, so a watcher is removed from the registry on
/// every exit path, unwinding included.
pub struct Subscription {
    id: SubscriberId,
    token: u64,
    receiver: mpsc::Receiver<ChangeEvent>,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next event; `None` once the registry closed this queue
    /// and every buffered event has been read.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<ChangeEvent, TryRecvError> {
        self.receiver.try_recv()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.token);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
