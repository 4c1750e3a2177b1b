//! Reply dispatch — hands a translated message to the reply pipeline and
//! delivers whatever comes back through the outbound send primitive.
//!
//! Failure isolation boundary: any error raised while resolving a route,
//! invoking the pipeline, or delivering a reply is caught and logged here.
//! It never terminates the poll loop and never rolls back the cursor
//! advance already recorded for the event.

use std::sync::Arc;

use tracing::{debug, error};

use crate::api::ServerApi;
use crate::pipeline::{InboundMessage, PipelineRequest, ReplyPipeline, ReplySink};

/// Routes translated messages into the external reply pipeline.
pub struct ReplyDispatcher {
    api: Arc<dyn ServerApi>,
    pipeline: Arc<dyn ReplyPipeline>,
    account: String,
}

impl ReplyDispatcher {
    pub fn new(
        api: Arc<dyn ServerApi>,
        pipeline: Arc<dyn ReplyPipeline>,
        account: String,
    ) -> Self {
        Self {
            api,
            pipeline,
            account,
        }
    }

    /// Session/agent routing key for a message's scope.
    pub fn routing_key(&self, message: &InboundMessage) -> String {
        format!("{}:{}", self.account, message.chat_id)
    }

    /// Dispatch one message. Per-message failures are contained here.
    pub async fn dispatch(&self, message: InboundMessage) {
        let route = self.routing_key(&message);
        let message_id = message.id.clone();
        debug!(
            account = %self.account,
            id = %message_id,
            route = %route,
            "dispatching inbound message"
        );

        let sink = ReplySink::new(Arc::clone(&self.api), message.reply_recipient());
        let request = PipelineRequest { route, message };

        if let Err(e) = self.pipeline.handle(request, &sink).await {
            error!(
                account = %self.account,
                id = %message_id,
                error = %e,
                "reply dispatch failed"
            );
        }
    }
}
