//! Streaming Delivery Loop
//!
//! Bridges one subscriber's queue to one outbound stream for as long as the
//! client stays connected. The loop ends on exactly one of: cancellation,
//! queue closure (registry shutdown or unsubscribe), or a failed write.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::event::ChangeEvent;
use super::registry::{NotifierError, SubscriberId, SubscriptionRegistry};

/// Outbound stream write failure
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Destination for the events of one watching client
#[async_trait]
pub trait EventSink: Send {
    /// Write one event to the client
    async fn send(&mut self, event: &ChangeEvent) -> Result<(), SinkError>;
}

/// Why a delivery loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The client went away or the request was cancelled
    Cancelled,
    /// The registry closed the queue; no more events will arrive
    Closed,
}

/// Generate a fresh subscriber id
pub fn new_subscriber_id() -> SubscriberId {
    Uuid::new_v4().to_string()
}

/// Run the delivery loop for one client until it terminates
///
/// The subscription is released when this function returns or unwinds.
/// Write failures are returned to the caller and never retried.
pub async fn watch<S>(
    registry: &Arc<SubscriptionRegistry>,
    subscriber_id: Option<SubscriberId>,
    cancel: CancellationToken,
    sink: &mut S,
) -> Result<WatchExit, NotifierError>
where
    S: EventSink + ?Sized,
{
    let id = subscriber_id.unwrap_or_else(new_subscriber_id);
    let mut subscription = registry.subscribe(id)?;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!(subscriber_id = %subscription.id(), "Watcher cancelled");
                return Ok(WatchExit::Cancelled);
            }
            next = subscription.recv() => {
                let Some(event) = next else {
                    tracing::debug!(subscriber_id = %subscription.id(), "Watcher queue closed");
                    return Ok(WatchExit::Closed);
                };

                if let Err(e) = sink.send(&event).await {
                    tracing::debug!(
                        subscriber_id = %subscription.id(),
                        error = %e,
                        "Failed to write change event, stopping watcher"
                    );
                    return Err(NotifierError::Delivery(e.to_string()));
                }
            }
        }
    }
}
