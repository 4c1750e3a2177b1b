//! Remote server API — object seam plus the production HTTP client.

pub mod http;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ApiError;
pub use http::HttpServerApi;
pub use types::{
    EventId, EventType, MessageId, NarrowFilter, OutboundMessage, OwnUser, QueueRegistration,
    RawEvent, RawMessage, Recipient,
};

/// Backend-agnostic interface to the remote server.
///
/// The gateway core only ever talks to the server through this trait, held
/// as `Arc<dyn ServerApi>`; tests substitute scripted implementations.
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Register a new event queue subscribed to the given event classes.
    async fn register_queue(
        &self,
        event_types: &[EventType],
    ) -> Result<QueueRegistration, ApiError>;

    /// Long-poll for events after `cursor` on `queue_id`.
    ///
    /// Holds for up to `timeout`; an empty window returns `Ok(vec![])`.
    /// An expired or unknown queue id returns [`ApiError::BadEventQueue`].
    async fn fetch_events(
        &self,
        queue_id: &str,
        cursor: &EventId,
        timeout: Duration,
    ) -> Result<Vec<RawEvent>, ApiError>;

    /// Fetch up to `limit` messages before `anchor` matching `narrow`.
    async fn fetch_history(
        &self,
        narrow: &NarrowFilter,
        anchor: &str,
        limit: usize,
    ) -> Result<Vec<RawMessage>, ApiError>;

    /// Resolve the account's own identity (used for self-filtering).
    async fn identify_self(&self) -> Result<OwnUser, ApiError>;

    /// Send a message (the outbound primitive).
    async fn send_message(&self, message: &OutboundMessage) -> Result<MessageId, ApiError>;

    /// Replace the content of a previously sent message.
    async fn edit_message(&self, message_id: &str, content: &str) -> Result<(), ApiError>;

    /// Add an emoji reaction to a message.
    async fn add_reaction(&self, message_id: &str, emoji_name: &str) -> Result<(), ApiError>;

    /// Delete a previously sent message.
    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError>;
}
