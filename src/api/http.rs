//! HTTP implementation of [`ServerApi`] over the server's REST surface.
//!
//! All requests use basic auth (account email + API key). Responses share a
//! JSON envelope: `{"result": "success", ...}` or
//! `{"result": "error", "code": "...", "msg": "..."}`. The
//! `BAD_EVENT_QUEUE_ID` code is the queue-invalid signal and maps to
//! [`ApiError::BadEventQueue`]; a pure client-side timeout on the long-poll
//! fetch maps to an empty event batch, not an error.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::api::types::{
    EventId, EventType, MessageId, NarrowFilter, OutboundMessage, OwnUser, QueueRegistration,
    RawEvent, RawMessage, Recipient,
};
use crate::api::ServerApi;
use crate::config::AccountConfig;
use crate::error::ApiError;

/// Error code the server uses for expired or unknown queue ids.
const BAD_EVENT_QUEUE_CODE: &str = "BAD_EVENT_QUEUE_ID";

/// Default timeout for plain request/response calls (not the long poll).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Production HTTP client for the remote server.
pub struct HttpServerApi {
    base_url: String,
    email: String,
    api_key: SecretString,
    client: reqwest::Client,
}

impl HttpServerApi {
    pub fn new(account: &AccountConfig) -> Self {
        Self {
            base_url: account.server_url.trim_end_matches('/').to_string(),
            email: account.email.clone(),
            api_key: account.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.api_url(path))
            .basic_auth(&self.email, Some(self.api_key.expose_secret()))
            .timeout(REQUEST_TIMEOUT)
    }

    /// Read a response body, enforce the success envelope, and return it.
    async fn read_envelope(
        &self,
        endpoint: &str,
        queue_id: Option<&str>,
        resp: reqwest::Response,
    ) -> Result<Value, ApiError> {
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let parsed: Value =
            serde_json::from_str(&body).map_err(|_| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: format!("non-JSON body (status {status})"),
            })?;

        if parsed.get("result").and_then(Value::as_str) == Some("success") {
            return Ok(parsed);
        }
        Err(error_from_envelope(endpoint, status, &parsed, queue_id))
    }

    fn transport_error(endpoint: &str, e: &reqwest::Error) -> ApiError {
        ApiError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Map an error envelope to an [`ApiError`].
fn error_from_envelope(
    endpoint: &str,
    status: u16,
    body: &Value,
    queue_id: Option<&str>,
) -> ApiError {
    let code = body.get("code").and_then(Value::as_str).unwrap_or("");
    let msg = body
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");

    if code == BAD_EVENT_QUEUE_CODE {
        if let Some(queue_id) = queue_id {
            return ApiError::BadEventQueue {
                queue_id: queue_id.to_string(),
            };
        }
    }

    ApiError::Status {
        endpoint: endpoint.to_string(),
        status,
        message: if code.is_empty() {
            msg.to_string()
        } else {
            format!("{code}: {msg}")
        },
    }
}

/// Extract a typed field from a success envelope.
fn envelope_field<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    body: &Value,
    field: &str,
) -> Result<T, ApiError> {
    let value = body.get(field).ok_or_else(|| ApiError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: format!("missing '{field}' field"),
    })?;
    serde_json::from_value(value.clone()).map_err(|e| ApiError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: format!("malformed '{field}' field: {e}"),
    })
}

#[async_trait]
impl ServerApi for HttpServerApi {
    async fn register_queue(
        &self,
        event_types: &[EventType],
    ) -> Result<QueueRegistration, ApiError> {
        let resp = self
            .request(reqwest::Method::POST, "register")
            .json(&serde_json::json!({ "event_types": event_types }))
            .send()
            .await
            .map_err(|e| ApiError::Registration {
                reason: e.to_string(),
            })?;

        let body = self
            .read_envelope("register", None, resp)
            .await
            .map_err(|e| ApiError::Registration {
                reason: e.to_string(),
            })?;

        serde_json::from_value(body).map_err(|e| ApiError::Registration {
            reason: format!("malformed registration response: {e}"),
        })
    }

    async fn fetch_events(
        &self,
        queue_id: &str,
        cursor: &EventId,
        timeout: Duration,
    ) -> Result<Vec<RawEvent>, ApiError> {
        let result = self
            .request(reqwest::Method::GET, "events")
            .timeout(timeout)
            .query(&[("queue_id", queue_id), ("last_event_id", cursor.as_str())])
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            // An empty long-poll window surfaces as a client-side timeout.
            // That is the normal idle outcome, not a failure.
            Err(e) if e.is_timeout() => return Ok(Vec::new()),
            Err(e) => return Err(Self::transport_error("events", &e)),
        };

        let body = self.read_envelope("events", Some(queue_id), resp).await?;
        envelope_field("events", &body, "events")
    }

    async fn fetch_history(
        &self,
        narrow: &NarrowFilter,
        anchor: &str,
        limit: usize,
    ) -> Result<Vec<RawMessage>, ApiError> {
        let narrow_json =
            serde_json::to_string(&narrow.to_json()).map_err(ApiError::Json)?;
        let resp = self
            .request(reqwest::Method::GET, "messages")
            .query(&[
                ("narrow", narrow_json.as_str()),
                ("anchor", anchor),
                ("num_before", &limit.to_string()),
                ("num_after", "0"),
            ])
            .send()
            .await
            .map_err(|e| Self::transport_error("messages", &e))?;

        let body = self.read_envelope("messages", None, resp).await?;
        envelope_field("messages", &body, "messages")
    }

    async fn identify_self(&self) -> Result<OwnUser, ApiError> {
        let resp = self
            .request(reqwest::Method::GET, "users/me")
            .send()
            .await
            .map_err(|e| Self::transport_error("users/me", &e))?;

        let body = self.read_envelope("users/me", None, resp).await?;
        serde_json::from_value(body).map_err(|e| ApiError::InvalidResponse {
            endpoint: "users/me".to_string(),
            reason: e.to_string(),
        })
    }

    async fn send_message(&self, message: &OutboundMessage) -> Result<MessageId, ApiError> {
        let payload = match &message.recipient {
            Recipient::Broadcast { scope, topic } => serde_json::json!({
                "type": "broadcast",
                "to": scope,
                "topic": topic,
                "content": message.content,
            }),
            Recipient::Direct { address } => serde_json::json!({
                "type": "direct",
                "to": address,
                "content": message.content,
            }),
        };

        let resp = self
            .request(reqwest::Method::POST, "messages")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::transport_error("messages", &e))?;

        let body = self.read_envelope("messages", None, resp).await?;
        envelope_field("messages", &body, "id")
    }

    async fn edit_message(&self, message_id: &str, content: &str) -> Result<(), ApiError> {
        let endpoint = format!("messages/{message_id}");
        let resp = self
            .request(reqwest::Method::PATCH, &endpoint)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| Self::transport_error(&endpoint, &e))?;
        self.read_envelope(&endpoint, None, resp).await.map(|_| ())
    }

    async fn add_reaction(&self, message_id: &str, emoji_name: &str) -> Result<(), ApiError> {
        let endpoint = format!("messages/{message_id}/reactions");
        let resp = self
            .request(reqwest::Method::POST, &endpoint)
            .json(&serde_json::json!({ "emoji_name": emoji_name }))
            .send()
            .await
            .map_err(|e| Self::transport_error(&endpoint, &e))?;
        self.read_envelope(&endpoint, None, resp).await.map(|_| ())
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ApiError> {
        let endpoint = format!("messages/{message_id}");
        let resp = self
            .request(reqwest::Method::DELETE, &endpoint)
            .send()
            .await
            .map_err(|e| Self::transport_error(&endpoint, &e))?;
        self.read_envelope(&endpoint, None, resp).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountConfig {
        AccountConfig {
            name: "test".into(),
            server_url: "https://chat.example.com/".into(),
            email: "bot@example.com".into(),
            api_key: SecretString::from("key"),
        }
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let api = HttpServerApi::new(&account());
        assert_eq!(api.api_url("events"), "https://chat.example.com/api/v1/events");
        assert_eq!(
            api.api_url("messages/m1/reactions"),
            "https://chat.example.com/api/v1/messages/m1/reactions"
        );
    }

    #[test]
    fn bad_event_queue_code_maps_to_queue_invalid() {
        let body = serde_json::json!({
            "result": "error",
            "code": "BAD_EVENT_QUEUE_ID",
            "msg": "Bad event queue id: q1",
        });
        let err = error_from_envelope("events", 400, &body, Some("q1"));
        assert!(err.is_queue_invalid());
        assert!(matches!(err, ApiError::BadEventQueue { queue_id } if queue_id == "q1"));
    }

    #[test]
    fn bad_event_queue_code_without_queue_context_stays_status() {
        let body = serde_json::json!({
            "result": "error",
            "code": "BAD_EVENT_QUEUE_ID",
            "msg": "Bad event queue id",
        });
        let err = error_from_envelope("register", 400, &body, None);
        assert!(!err.is_queue_invalid());
    }

    #[test]
    fn other_error_codes_map_to_status() {
        let body = serde_json::json!({
            "result": "error",
            "code": "RATE_LIMIT_HIT",
            "msg": "too many requests",
        });
        let err = error_from_envelope("messages", 429, &body, Some("q1"));
        match err {
            ApiError::Status { status, message, .. } => {
                assert_eq!(status, 429);
                assert!(message.contains("RATE_LIMIT_HIT"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_field_extracts_events() {
        let body = serde_json::json!({
            "result": "success",
            "events": [
                {"id": "e1", "type": "heartbeat"},
            ],
        });
        let events: Vec<RawEvent> = envelope_field("events", &body, "events").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, EventId::from("e1"));
    }

    #[test]
    fn envelope_field_missing_is_invalid_response() {
        let body = serde_json::json!({"result": "success"});
        let err = envelope_field::<Vec<RawEvent>>("events", &body, "events").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }
}
