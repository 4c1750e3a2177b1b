//! Context backfill — best-effort transcript of recent messages in the
//! same scope, attached before dispatch.
//!
//! Everything here is advisory: a failed, slow, or empty history fetch
//! yields no context and a warning, never an error. Dispatch proceeds
//! either way.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::api::types::{NarrowFilter, RawMessage};
use crate::api::ServerApi;
use crate::config::GatewayConfig;
use crate::gateway::translate::strip_tags;
use crate::pipeline::InboundMessage;

/// Display name used for the bot's own messages in transcripts.
pub const SELF_PLACEHOLDER: &str = "me";

/// Fetches and formats recent conversation history for one account.
pub struct ContextBackfiller {
    api: Arc<dyn ServerApi>,
    self_id: String,
    self_email: String,
    limit: usize,
    timeout: Duration,
}

impl ContextBackfiller {
    pub fn new(
        api: Arc<dyn ServerApi>,
        self_id: String,
        self_email: String,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            api,
            self_id,
            self_email,
            limit: config.backfill_limit,
            timeout: config.backfill_timeout,
        }
    }

    /// Fetch up to `backfill_limit` messages before `message` in its scope
    /// and render them as a transcript. Never errors outward.
    pub async fn fetch_context(&self, message: &InboundMessage) -> Option<String> {
        let narrow = self.narrow_for(message);
        let fetch = self.api.fetch_history(&narrow, &message.id, self.limit);

        let history = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(history)) => history,
            Ok(Err(e)) => {
                warn!(
                    message_id = %message.id,
                    error = %e,
                    "context backfill failed; dispatching without context"
                );
                return None;
            }
            Err(_) => {
                warn!(
                    message_id = %message.id,
                    timeout = ?self.timeout,
                    "context backfill timed out; dispatching without context"
                );
                return None;
            }
        };

        if history.is_empty() {
            return None;
        }

        let transcript = history
            .iter()
            .map(|m| self.format_line(m))
            .collect::<Vec<_>>()
            .join("\n");
        Some(transcript)
    }

    /// Scope filter for the triggering message: broadcast channel + topic,
    /// or the two direct participants.
    fn narrow_for(&self, message: &InboundMessage) -> NarrowFilter {
        match &message.group_label {
            Some(scope) => NarrowFilter::Broadcast {
                scope: scope.clone(),
                topic: message.thread_label.clone(),
            },
            None => NarrowFilter::Direct {
                participants: [message.from.clone(), self.self_email.clone()],
            },
        }
    }

    /// One transcript line: `[sender] stripped content [reacts: r1, r2]`.
    fn format_line(&self, message: &RawMessage) -> String {
        let sender = if message.sender_id == self.self_id {
            SELF_PLACEHOLDER
        } else {
            &message.sender_name
        };

        let mut line = format!("[{sender}] {}", strip_tags(&message.html_content));
        if !message.reactions.is_empty() {
            let names: Vec<String> = message
                .reactions
                .iter()
                .map(|r| strip_tags(&r.emoji_name))
                .collect();
            line.push_str(&format!(" [reacts: {}]", names.join(", ")));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        broadcast_message, direct_message, transport_error, with_reactions, ScriptedApi,
    };

    fn backfiller(api: Arc<ScriptedApi>) -> ContextBackfiller {
        ContextBackfiller::new(
            api as _,
            "self".into(),
            "bot@example.com".into(),
            &GatewayConfig::default(),
        )
    }

    fn inbound_broadcast() -> InboundMessage {
        InboundMessage {
            id: "m100".into(),
            from: "u2@example.com".into(),
            chat_id: "broadcast:general".into(),
            sender_id: "u2".into(),
            sender_name: "User u2".into(),
            sender_handle: "u2".into(),
            text: "hi".into(),
            thread_label: Some("intro".into()),
            group_label: Some("general".into()),
            timestamp_millis: 1_700_000_000_000,
            context: None,
        }
    }

    #[tokio::test]
    async fn formats_transcript_with_reactions_and_self_placeholder() {
        let api = Arc::new(ScriptedApi::new());
        api.script_history(Ok(vec![
            with_reactions(
                broadcast_message("m90", "u3", "<p>earlier</p>", "general", "intro"),
                &["tada", "heart"],
            ),
            broadcast_message("m91", "self", "my <em>own</em> reply", "general", "intro"),
        ]));

        let context = backfiller(Arc::clone(&api))
            .fetch_context(&inbound_broadcast())
            .await
            .unwrap();

        assert_eq!(
            context,
            "[User u3] earlier [reacts: tada, heart]\n[me] my own reply"
        );
    }

    #[tokio::test]
    async fn no_reaction_suffix_without_reactions() {
        let api = Arc::new(ScriptedApi::new());
        api.script_history(Ok(vec![broadcast_message(
            "m90", "u3", "plain", "general", "intro",
        )]));

        let context = backfiller(api).fetch_context(&inbound_broadcast()).await;
        assert_eq!(context.as_deref(), Some("[User u3] plain"));
    }

    #[tokio::test]
    async fn direct_scope_narrows_on_both_participants() {
        let api = Arc::new(ScriptedApi::new());
        let bf = backfiller(api);
        let mut message = inbound_broadcast();
        message.group_label = None;
        message.thread_label = None;

        let narrow = bf.narrow_for(&message);
        assert_eq!(
            narrow,
            NarrowFilter::Direct {
                participants: ["u2@example.com".into(), "bot@example.com".into()],
            }
        );
    }

    #[tokio::test]
    async fn broadcast_scope_narrows_on_channel_and_topic() {
        let api = Arc::new(ScriptedApi::new());
        let bf = backfiller(api);

        let narrow = bf.narrow_for(&inbound_broadcast());
        assert_eq!(
            narrow,
            NarrowFilter::Broadcast {
                scope: "general".into(),
                topic: Some("intro".into()),
            }
        );
    }

    #[tokio::test]
    async fn empty_history_yields_none() {
        let api = Arc::new(ScriptedApi::new());
        api.script_history(Ok(vec![]));
        assert!(backfiller(api).fetch_context(&inbound_broadcast()).await.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_yields_none() {
        let api = Arc::new(ScriptedApi::new());
        api.script_history(Err(transport_error()));
        assert!(backfiller(api).fetch_context(&inbound_broadcast()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_to_none() {
        // Unscripted history hangs forever; the timeout must cut it off.
        let api = Arc::new(ScriptedApi::new());
        assert!(backfiller(api).fetch_context(&inbound_broadcast()).await.is_none());
    }

    #[tokio::test]
    async fn anchor_and_limit_are_forwarded() {
        let api = Arc::new(ScriptedApi::new());
        api.script_history(Ok(vec![direct_message("m1", "u2", "x")]));
        backfiller(Arc::clone(&api))
            .fetch_context(&inbound_broadcast())
            .await;

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            crate::testutil::ApiCall::FetchHistory { anchor, limit }
                if anchor == "m100" && *limit == GatewayConfig::default().backfill_limit
        ));
    }
}
