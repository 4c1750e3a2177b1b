//! Outbound action dispatch — a closed set of server-side operations.
//!
//! Actions arrive as a name plus JSON parameters and dispatch over the
//! [`ServerApi`] outbound primitives through a tagged enum rather than a
//! string-compare chain.

use std::str::FromStr;

use serde_json::Value;

use crate::api::types::{MessageId, OutboundMessage, Recipient};
use crate::api::ServerApi;
use crate::error::ActionError;

/// The closed set of outbound action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SendMessage,
    EditMessage,
    AddReaction,
    DeleteMessage,
}

impl ActionKind {
    /// Wire/config name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::EditMessage => "edit_message",
            Self::AddReaction => "add_reaction",
            Self::DeleteMessage => "delete_message",
        }
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send_message" => Ok(Self::SendMessage),
            "edit_message" => Ok(Self::EditMessage),
            "add_reaction" => Ok(Self::AddReaction),
            "delete_message" => Ok(Self::DeleteMessage),
            other => Err(ActionError::UnknownKind(other.to_string())),
        }
    }
}

/// A fully parsed outbound action, ready to perform.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    SendMessage {
        recipient: Recipient,
        content: String,
    },
    EditMessage {
        message_id: String,
        content: String,
    },
    AddReaction {
        message_id: String,
        emoji_name: String,
    },
    DeleteMessage {
        message_id: String,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SendMessage { .. } => ActionKind::SendMessage,
            Self::EditMessage { .. } => ActionKind::EditMessage,
            Self::AddReaction { .. } => ActionKind::AddReaction,
            Self::DeleteMessage { .. } => ActionKind::DeleteMessage,
        }
    }

    /// Parse an action from its name and JSON parameters.
    pub fn parse(name: &str, params: &Value) -> Result<Self, ActionError> {
        let kind = ActionKind::from_str(name)?;
        match kind {
            ActionKind::SendMessage => Ok(Self::SendMessage {
                recipient: parse_recipient(kind, params)?,
                content: required_str(kind, params, "content")?,
            }),
            ActionKind::EditMessage => Ok(Self::EditMessage {
                message_id: required_str(kind, params, "message_id")?,
                content: required_str(kind, params, "content")?,
            }),
            ActionKind::AddReaction => Ok(Self::AddReaction {
                message_id: required_str(kind, params, "message_id")?,
                emoji_name: required_str(kind, params, "emoji_name")?,
            }),
            ActionKind::DeleteMessage => Ok(Self::DeleteMessage {
                message_id: required_str(kind, params, "message_id")?,
            }),
        }
    }
}

fn required_str(kind: ActionKind, params: &Value, field: &str) -> Result<String, ActionError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ActionError::InvalidParameters {
            kind: kind.as_str().to_string(),
            reason: format!("missing '{field}'"),
        })
}

/// Recipient from params: `address` for direct, else `scope` (+ `topic`).
fn parse_recipient(kind: ActionKind, params: &Value) -> Result<Recipient, ActionError> {
    if let Some(address) = params.get("address").and_then(Value::as_str) {
        return Ok(Recipient::Direct {
            address: address.to_string(),
        });
    }
    let scope = required_str(kind, params, "scope")?;
    let topic = params
        .get("topic")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Recipient::Broadcast { scope, topic })
}

/// Perform one action against the server.
///
/// Returns the new message id for sends; other actions return `None`.
pub async fn perform(
    api: &dyn ServerApi,
    request: ActionRequest,
) -> Result<Option<MessageId>, ActionError> {
    let kind = request.kind();
    let failed = |source| ActionError::Failed {
        kind: kind.as_str().to_string(),
        source,
    };

    match request {
        ActionRequest::SendMessage { recipient, content } => {
            let id = api
                .send_message(&OutboundMessage { recipient, content })
                .await
                .map_err(failed)?;
            Ok(Some(id))
        }
        ActionRequest::EditMessage {
            message_id,
            content,
        } => {
            api.edit_message(&message_id, &content)
                .await
                .map_err(failed)?;
            Ok(None)
        }
        ActionRequest::AddReaction {
            message_id,
            emoji_name,
        } => {
            api.add_reaction(&message_id, &emoji_name)
                .await
                .map_err(failed)?;
            Ok(None)
        }
        ActionRequest::DeleteMessage { message_id } => {
            api.delete_message(&message_id).await.map_err(failed)?;
            Ok(None)
        }
    }
}
