//! Wire types for the remote server API.
//!
//! Events arrive from a long-poll queue tagged by `type`; message payloads
//! carry HTML content that is stripped before anything leaves the gateway.

use serde::{Deserialize, Serialize};

// ── Event queue ─────────────────────────────────────────────────────

/// Opaque, server-assigned event id. Monotonically increasing for the
/// lifetime of one queue; used as the fetch cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Event classes a queue can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Message,
    Reaction,
}

/// Result of registering (or reregistering) an event queue.
///
/// Both fields are adopted together — a cursor is only ever taken from a
/// registration response, never invented client-side.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueRegistration {
    pub queue_id: String,
    #[serde(rename = "last_event_id")]
    pub cursor: EventId,
}

// ── Events ──────────────────────────────────────────────────────────

/// One event returned by a queue fetch. Consumed once, never stored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: EventId,
    #[serde(flatten)]
    pub body: EventBody,
}

/// Event payload, tagged by the wire `type` field.
///
/// Types the gateway does not understand still advance the cursor; they
/// deserialize as `Unknown` and are skipped with a debug log.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    Message { message: RawMessage },
    Reaction(ReactionEvent),
    Heartbeat,
    #[serde(other)]
    Unknown,
}

/// A reaction added to an earlier message.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionEvent {
    pub message_id: String,
    pub emoji_name: String,
    pub sender_id: String,
}

// ── Messages ────────────────────────────────────────────────────────

/// Addressing context of a message: a named broadcast channel (with an
/// optional topic) or a direct pairing between two addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Broadcast,
    Direct,
}

/// A platform-native message as returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub scope_kind: ScopeKind,
    /// Broadcast channel name; empty for direct messages.
    #[serde(default)]
    pub scope_name: String,
    #[serde(default)]
    pub topic_label: Option<String>,
    pub html_content: String,
    #[serde(rename = "timestamp")]
    pub timestamp_secs: i64,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// A reaction attached to a fetched message.
#[derive(Debug, Clone, Deserialize)]
pub struct Reaction {
    pub emoji_name: String,
}

/// Resolved identity of the account itself, used for self-filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnUser {
    pub user_id: String,
    pub full_name: String,
}

/// Server-assigned id of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageId(pub String);

// ── Outbound ────────────────────────────────────────────────────────

/// Where an outbound message goes: back into a broadcast channel + topic,
/// or to a direct address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Broadcast {
        scope: String,
        topic: Option<String>,
    },
    Direct {
        address: String,
    },
}

/// An outbound message for the send primitive.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub recipient: Recipient,
    pub content: String,
}

// ── History narrow ──────────────────────────────────────────────────

/// Scope filter for a history fetch: the broadcast channel + topic of the
/// triggering message, or the two participants of a direct conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrowFilter {
    Broadcast {
        scope: String,
        topic: Option<String>,
    },
    Direct {
        participants: [String; 2],
    },
}

impl NarrowFilter {
    /// Serialize to the server's operator/operand list form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Broadcast { scope, topic } => {
                let mut ops = vec![serde_json::json!({
                    "operator": "scope",
                    "operand": scope,
                })];
                if let Some(topic) = topic {
                    ops.push(serde_json::json!({
                        "operator": "topic",
                        "operand": topic,
                    }));
                }
                serde_json::Value::Array(ops)
            }
            Self::Direct { participants } => serde_json::json!([{
                "operator": "dm",
                "operand": participants.join(","),
            }]),
        }
    }
}
