//! Event-queue lifecycle — registration, expiry detection, reregistration.

use std::sync::Arc;

use tracing::info;

use crate::api::{EventId, EventType, ServerApi};
use crate::error::ApiError;

/// Event classes every queue subscribes to.
pub const SUBSCRIBED_EVENTS: [EventType; 2] = [EventType::Message, EventType::Reaction];

/// The durable subscription state: an opaque queue id plus the fetch cursor.
///
/// Owned exclusively by one poll loop. Both fields are replaced together
/// from a registration response on expiry — never independently, and the
/// cursor is never invented client-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQueueHandle {
    pub queue_id: String,
    pub cursor: EventId,
}

impl EventQueueHandle {
    /// Advance the cursor past a consumed event.
    pub fn advance(&mut self, id: &EventId) {
        self.cursor = id.clone();
    }
}

/// Lifecycle state of the queue subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueState {
    /// No queue established yet.
    Unregistered,
    /// A queue is live and being polled.
    Registered,
    /// The server rejected the queue id; a reregistration is due.
    Expired,
    /// The session was cancelled. Terminal.
    Aborted,
}

/// Manages queue registration and recovery for one account session.
pub struct QueueLifecycle {
    api: Arc<dyn ServerApi>,
    account: String,
    state: QueueState,
}

impl QueueLifecycle {
    pub fn new(api: Arc<dyn ServerApi>, account: String) -> Self {
        Self {
            api,
            account,
            state: QueueState::Unregistered,
        }
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    /// Request a fresh queue subscribed to [`SUBSCRIBED_EVENTS`].
    pub async fn register(&mut self) -> Result<EventQueueHandle, ApiError> {
        let registration = self.api.register_queue(&SUBSCRIBED_EVENTS).await?;
        self.state = QueueState::Registered;
        info!(
            account = %self.account,
            queue_id = %registration.queue_id,
            cursor = %registration.cursor,
            "registered event queue"
        );
        Ok(EventQueueHandle {
            queue_id: registration.queue_id,
            cursor: registration.cursor,
        })
    }

    /// Record that the server rejected the current queue id.
    pub fn mark_expired(&mut self) {
        self.state = QueueState::Expired;
    }

    /// Recover from expiry with an identical registration request.
    ///
    /// Callers replace their entire handle with the result; the returned
    /// cursor comes from the server, not from the expired handle.
    pub async fn reregister(&mut self) -> Result<EventQueueHandle, ApiError> {
        self.register().await
    }

    /// Terminal transition on cancellation.
    pub fn abort(&mut self) {
        self.state = QueueState::Aborted;
    }
}
