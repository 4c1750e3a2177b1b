//! Shared test doubles — a scripted [`ServerApi`] with call recording.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::api::types::{
    EventId, EventType, MessageId, NarrowFilter, OutboundMessage, OwnUser, QueueRegistration,
    RawEvent, RawMessage, Reaction, Recipient, ScopeKind,
};
use crate::api::ServerApi;
use crate::error::ApiError;

/// One recorded API call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    Register,
    FetchEvents { queue_id: String, cursor: EventId },
    FetchHistory { anchor: String, limit: usize },
    IdentifySelf,
    Send { recipient: Recipient, content: String },
    Edit { message_id: String, content: String },
    React { message_id: String, emoji_name: String },
    Delete { message_id: String },
}

/// Scripted `ServerApi`: each method pops the next scripted response and
/// records the call. When the fetch script runs dry, the mock fires
/// `exhausted` (so a poll loop under test can be cancelled) and parks.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    pub registrations: Mutex<VecDeque<Result<QueueRegistration, ApiError>>>,
    pub fetches: Mutex<VecDeque<Result<Vec<RawEvent>, ApiError>>>,
    pub histories: Mutex<VecDeque<Result<Vec<RawMessage>, ApiError>>>,
    pub identities: Mutex<VecDeque<Result<OwnUser, ApiError>>>,
    pub send_results: Mutex<VecDeque<Result<MessageId, ApiError>>>,
    pub calls: Mutex<Vec<ApiCall>>,
    pub fetch_times: Mutex<Vec<tokio::time::Instant>>,
    pub exhausted: CancellationToken,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_registration(&self, result: Result<QueueRegistration, ApiError>) {
        self.registrations.lock().unwrap().push_back(result);
    }

    pub fn script_fetch(&self, result: Result<Vec<RawEvent>, ApiError>) {
        self.fetches.lock().unwrap().push_back(result);
    }

    pub fn script_history(&self, result: Result<Vec<RawMessage>, ApiError>) {
        self.histories.lock().unwrap().push_back(result);
    }

    pub fn script_identity(&self, result: Result<OwnUser, ApiError>) {
        self.identities.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<(Recipient, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Send { recipient, content } => Some((recipient, content)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ServerApi for ScriptedApi {
    async fn register_queue(
        &self,
        event_types: &[EventType],
    ) -> Result<QueueRegistration, ApiError> {
        assert!(
            event_types.contains(&EventType::Message),
            "queues must subscribe to message events"
        );
        self.record(ApiCall::Register);
        self.registrations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted register_queue call"))
    }

    async fn fetch_events(
        &self,
        queue_id: &str,
        cursor: &EventId,
        _timeout: Duration,
    ) -> Result<Vec<RawEvent>, ApiError> {
        self.record(ApiCall::FetchEvents {
            queue_id: queue_id.to_string(),
            cursor: cursor.clone(),
        });
        self.fetch_times.lock().unwrap().push(tokio::time::Instant::now());

        let next = self.fetches.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                // Script exhausted: signal the test and park forever.
                self.exhausted.cancel();
                std::future::pending().await
            }
        }
    }

    async fn fetch_history(
        &self,
        _narrow: &NarrowFilter,
        anchor: &str,
        limit: usize,
    ) -> Result<Vec<RawMessage>, ApiError> {
        self.record(ApiCall::FetchHistory {
            anchor: anchor.to_string(),
            limit,
        });
        let next = self.histories.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            // Unscripted history hangs, standing in for a slow server.
            None => std::future::pending().await,
        }
    }

    async fn identify_self(&self) -> Result<OwnUser, ApiError> {
        self.record(ApiCall::IdentifySelf);
        self.identities
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(OwnUser {
                    user_id: "self".into(),
                    full_name: "Gateway Bot".into(),
                })
            })
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<MessageId, ApiError> {
        self.record(ApiCall::Send {
            recipient: message.recipient.clone(),
            content: message.content.clone(),
        });
        self.send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(MessageId("sent".into())))
    }

    async fn edit_message(&self, message_id: &str, content: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Edit {
            message_id: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn add_reaction(&self, message_id: &str, emoji_name: &str) -> Result<(), ApiError> {
        self.record(ApiCall::React {
            message_id: message_id.to_string(),
            emoji_name: emoji_name.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Delete {
            message_id: message_id.to_string(),
        });
        Ok(())
    }
}

// ── Builders ────────────────────────────────────────────────────────

pub(crate) fn registration(queue_id: &str, cursor: &str) -> QueueRegistration {
    QueueRegistration {
        queue_id: queue_id.into(),
        cursor: EventId::from(cursor),
    }
}

pub(crate) fn broadcast_message(
    id: &str,
    sender_id: &str,
    html: &str,
    scope: &str,
    topic: &str,
) -> RawMessage {
    RawMessage {
        id: id.into(),
        sender_id: sender_id.into(),
        sender_email: format!("{sender_id}@example.com"),
        sender_name: format!("User {sender_id}"),
        scope_kind: ScopeKind::Broadcast,
        scope_name: scope.into(),
        topic_label: Some(topic.into()),
        html_content: html.into(),
        timestamp_secs: 1_700_000_000,
        reactions: Vec::new(),
    }
}

pub(crate) fn direct_message(id: &str, sender_id: &str, html: &str) -> RawMessage {
    RawMessage {
        id: id.into(),
        sender_id: sender_id.into(),
        sender_email: format!("{sender_id}@example.com"),
        sender_name: format!("User {sender_id}"),
        scope_kind: ScopeKind::Direct,
        scope_name: String::new(),
        topic_label: None,
        html_content: html.into(),
        timestamp_secs: 1_700_000_000,
        reactions: Vec::new(),
    }
}

pub(crate) fn with_reactions(mut message: RawMessage, names: &[&str]) -> RawMessage {
    message.reactions = names
        .iter()
        .map(|name| Reaction {
            emoji_name: (*name).to_string(),
        })
        .collect();
    message
}

pub(crate) fn message_event(event_id: &str, message: RawMessage) -> RawEvent {
    RawEvent {
        id: EventId::from(event_id),
        body: crate::api::types::EventBody::Message { message },
    }
}

pub(crate) fn heartbeat_event(event_id: &str) -> RawEvent {
    RawEvent {
        id: EventId::from(event_id),
        body: crate::api::types::EventBody::Heartbeat,
    }
}

pub(crate) fn transport_error() -> ApiError {
    ApiError::Transport {
        endpoint: "events".into(),
        reason: "connection reset".into(),
    }
}

pub(crate) fn queue_invalid(queue_id: &str) -> ApiError {
    ApiError::BadEventQueue {
        queue_id: queue_id.into(),
    }
}
