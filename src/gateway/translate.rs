//! Event translation — raw platform events into canonical inbound messages.
//!
//! Self-authored events are filtered here. A broken self-filter turns every
//! reply the bot sends into a fresh inbound event and loops forever, so the
//! filter is a hard guarantee, not a convenience.

use std::sync::LazyLock;

use regex::Regex;

use crate::api::types::{EventBody, RawEvent, RawMessage, ScopeKind};
use crate::pipeline::{InboundMessage, BROADCAST_CHAT_PREFIX, DIRECT_CHAT_PREFIX};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Remove `<...>` markup sequences. Text with no tags passes through
/// unchanged. Applied uniformly to message bodies and backfilled history.
pub fn strip_tags(input: &str) -> String {
    TAG_PATTERN.replace_all(input, "").into_owned()
}

/// Why an event produced no inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Authored by the bot itself.
    OwnMessage,
    /// Reactions keep the queue alive but are not dispatched.
    Reaction,
    /// Server keep-alive.
    Heartbeat,
    /// Event type this gateway does not understand.
    UnknownEventType,
}

impl SkipReason {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OwnMessage => "own_message",
            Self::Reaction => "reaction",
            Self::Heartbeat => "heartbeat",
            Self::UnknownEventType => "unknown_event_type",
        }
    }
}

/// Translate one raw event into a canonical inbound message, or report
/// why it was skipped. Skipped events still advance the cursor.
pub fn translate(event: &RawEvent, self_id: &str) -> Result<InboundMessage, SkipReason> {
    let message = match &event.body {
        EventBody::Message { message } => message,
        EventBody::Reaction(_) => return Err(SkipReason::Reaction),
        EventBody::Heartbeat => return Err(SkipReason::Heartbeat),
        EventBody::Unknown => return Err(SkipReason::UnknownEventType),
    };

    if message.sender_id == self_id {
        return Err(SkipReason::OwnMessage);
    }

    Ok(translate_message(message))
}

fn translate_message(message: &RawMessage) -> InboundMessage {
    let (chat_id, thread_label, group_label) = match message.scope_kind {
        ScopeKind::Broadcast => (
            format!("{BROADCAST_CHAT_PREFIX}{}", message.scope_name),
            message.topic_label.clone(),
            Some(message.scope_name.clone()),
        ),
        ScopeKind::Direct => (
            format!("{DIRECT_CHAT_PREFIX}{}", message.sender_email),
            None,
            None,
        ),
    };

    InboundMessage {
        id: message.id.clone(),
        from: message.sender_email.clone(),
        chat_id,
        sender_id: message.sender_id.clone(),
        sender_name: message.sender_name.clone(),
        sender_handle: handle_from_email(&message.sender_email),
        text: strip_tags(&message.html_content),
        thread_label,
        group_label,
        timestamp_millis: message.timestamp_secs * 1000,
        context: None,
    }
}

/// Local part of the sender address, used as a short display handle.
fn handle_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
