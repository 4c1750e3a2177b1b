//! Account sessions — one configured account bound to one running poll loop.
//!
//! `start_account` is the entry point the hosting runtime calls. It resolves
//! the bot's own identity, registers the event queue, and runs the loop to
//! cancellation. Identity or registration failure is fatal to session start
//! and surfaces to the caller instead of being retried silently.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{RawEvent, ServerApi};
use crate::config::{AccountConfig, GatewayConfig};
use crate::error::SessionError;
use crate::gateway::backfill::ContextBackfiller;
use crate::gateway::dispatch::ReplyDispatcher;
use crate::gateway::poll::{EventSink, PollLoop};
use crate::gateway::queue::QueueLifecycle;
use crate::gateway::translate;
use crate::pipeline::ReplyPipeline;

/// Per-event worker: translate → backfill → dispatch, strictly in order.
struct SessionWorker {
    account: String,
    self_id: String,
    backfiller: Option<ContextBackfiller>,
    dispatcher: ReplyDispatcher,
}

#[async_trait]
impl EventSink for SessionWorker {
    async fn process(&mut self, event: RawEvent) {
        let mut message = match translate::translate(&event, &self.self_id) {
            Ok(message) => message,
            Err(reason) => {
                debug!(
                    account = %self.account,
                    event_id = %event.id,
                    reason = reason.label(),
                    "skipping event"
                );
                return;
            }
        };

        if let Some(backfiller) = &self.backfiller {
            message.context = backfiller.fetch_context(&message).await;
        }

        self.dispatcher.dispatch(message).await;
    }
}

/// Run one account session until the cancellation token fires.
///
/// The reply pipeline is an explicit dependency — no global runtime state
/// is consulted.
pub async fn start_account(
    account: AccountConfig,
    config: GatewayConfig,
    api: Arc<dyn ServerApi>,
    pipeline: Arc<dyn ReplyPipeline>,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let own = api
        .identify_self()
        .await
        .map_err(|e| SessionError::Identity {
            account: account.name.clone(),
            source: e,
        })?;
    info!(
        account = %account.name,
        user_id = %own.user_id,
        name = %own.full_name,
        "resolved own identity"
    );

    let mut lifecycle = QueueLifecycle::new(Arc::clone(&api), account.name.clone());
    let handle = lifecycle
        .register()
        .await
        .map_err(|e| SessionError::Registration {
            account: account.name.clone(),
            source: e,
        })?;

    let backfiller = config.backfill_enabled.then(|| {
        ContextBackfiller::new(
            Arc::clone(&api),
            own.user_id.clone(),
            account.email.clone(),
            &config,
        )
    });
    let mut worker = SessionWorker {
        account: account.name.clone(),
        self_id: own.user_id,
        backfiller,
        dispatcher: ReplyDispatcher::new(Arc::clone(&api), pipeline, account.name.clone()),
    };

    let poll = PollLoop::new(api, config, account.name.clone(), cancel);
    poll.run(&mut lifecycle, handle, &mut worker).await;

    info!(account = %account.name, "account session stopped");
    Ok(())
}
