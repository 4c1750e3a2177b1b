//! Reply-pipeline contract — the seam between the gateway and the
//! downstream message-handling system.
//!
//! The gateway translates platform events into [`InboundMessage`]s and hands
//! them to a [`ReplyPipeline`] together with a [`ReplySink`]. Whatever the
//! pipeline produces flows back out through the sink, which reuses the
//! triggering message's scope. The pipeline's internals (agents, sessions,
//! personas) are not this crate's business.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::api::{OutboundMessage, Recipient, ServerApi};
use crate::error::PipelineError;

/// Chat prefix for messages arriving from a broadcast channel.
pub const BROADCAST_CHAT_PREFIX: &str = "broadcast:";

/// Chat prefix for direct messages.
pub const DIRECT_CHAT_PREFIX: &str = "dm:";

/// Whether a conversation is a shared channel or a one-on-one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Group,
    Direct,
}

/// The translated, markup-stripped, scope-normalized inbound message.
///
/// Created by the translator, optionally enriched with `context` by the
/// backfiller, consumed by the dispatcher. Never mutated after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    /// Platform-native message id.
    pub id: String,
    /// Sender address (email), used for direct replies.
    pub from: String,
    /// Normalized conversation id: `broadcast:{scope}` or `dm:{address}`.
    pub chat_id: String,
    /// Platform-native sender id.
    pub sender_id: String,
    /// Human-readable sender name.
    pub sender_name: String,
    /// Short handle derived from the sender address (local part).
    pub sender_handle: String,
    /// Markup-stripped message body.
    pub text: String,
    /// Topic label, present for broadcast messages only.
    pub thread_label: Option<String>,
    /// Broadcast channel name, present for broadcast messages only.
    pub group_label: Option<String>,
    /// Message timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
    /// Best-effort transcript of recent messages in the same scope.
    pub context: Option<String>,
}

impl InboundMessage {
    /// Group vs direct, derived from the scope the message arrived on.
    pub fn chat_kind(&self) -> ChatKind {
        if self.group_label.is_some() {
            ChatKind::Group
        } else {
            ChatKind::Direct
        }
    }

    /// The outbound recipient that reuses this message's scope: same
    /// broadcast channel + topic, or the sender's direct address.
    pub fn reply_recipient(&self) -> Recipient {
        match &self.group_label {
            Some(scope) => Recipient::Broadcast {
                scope: scope.clone(),
                topic: self.thread_label.clone(),
            },
            None => Recipient::Direct {
                address: self.from.clone(),
            },
        }
    }
}

/// What the pipeline hands back for delivery: plain text or a structured
/// payload carrying the text under `body` or `text`.
#[derive(Debug, Clone)]
pub enum ReplyPayload {
    Text(String),
    Structured(serde_json::Value),
}

/// Extract deliverable text from a reply payload.
///
/// Returns `None` for empty or whitespace-only text and for structured
/// payloads with no usable `body`/`text` field — nothing is sent for those.
pub fn extract_reply_text(payload: &ReplyPayload) -> Option<String> {
    let text = match payload {
        ReplyPayload::Text(text) => text.as_str(),
        ReplyPayload::Structured(value) => value
            .get("body")
            .and_then(serde_json::Value::as_str)
            .or_else(|| value.get("text").and_then(serde_json::Value::as_str))?,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Delivery sink handed to the pipeline alongside each message.
///
/// Bound to the triggering message's scope at construction, so the pipeline
/// cannot reply anywhere else.
pub struct ReplySink {
    api: Arc<dyn ServerApi>,
    recipient: Recipient,
}

impl ReplySink {
    pub fn new(api: Arc<dyn ServerApi>, recipient: Recipient) -> Self {
        Self { api, recipient }
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// Deliver one reply chunk. Empty payloads are dropped silently.
    pub async fn deliver(&self, payload: ReplyPayload) -> Result<(), PipelineError> {
        let Some(content) = extract_reply_text(&payload) else {
            debug!("dropping empty reply payload");
            return Ok(());
        };

        self.api
            .send_message(&OutboundMessage {
                recipient: self.recipient.clone(),
                content,
            })
            .await?;
        Ok(())
    }
}

/// The request shape the dispatcher builds for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Routing key for session/agent selection: `{account}:{chat_id}`.
    pub route: String,
    /// The translated (and possibly context-enriched) message.
    pub message: InboundMessage,
}

/// The external reply pipeline, behind an object seam.
///
/// Implementations may perform their own network I/O and emit zero or more
/// reply chunks through the sink before returning.
#[async_trait]
pub trait ReplyPipeline: Send + Sync {
    async fn handle(
        &self,
        request: PipelineRequest,
        replies: &ReplySink,
    ) -> Result<(), PipelineError>;
}

/// Demo pipeline that echoes each inbound message back to its scope.
///
/// Stands in for the real downstream system so the binary runs end to end.
pub struct EchoPipeline;

#[async_trait]
impl ReplyPipeline for EchoPipeline {
    async fn handle(
        &self,
        request: PipelineRequest,
        replies: &ReplySink,
    ) -> Result<(), PipelineError> {
        let text = format!("{}: {}", request.message.sender_handle, request.message.text);
        replies.deliver(ReplyPayload::Text(text)).await
    }
}
