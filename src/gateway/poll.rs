//! The long-poll retrieval loop.
//!
//! One loop runs per account session. Each iteration issues a single
//! long-poll fetch and lands in one of three places:
//!
//! 1. events — every event is processed in order, to completion, before
//!    the next iteration; the cursor advances past each event before that
//!    event is handed to the sink (at-most-once delivery);
//! 2. queue invalid — one reregistration, then continue immediately;
//!    expected maintenance, not a fault, so no backoff;
//! 3. failure — fixed backoff, then retry. A client-side timeout with zero
//!    events is the normal idle outcome and retries immediately.
//!
//! Cancellation is checked at the top of each iteration and raced against
//! the in-flight fetch, so shutdown latency is bounded by one long-poll
//! timeout rather than the idle duration.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{RawEvent, ServerApi};
use crate::config::GatewayConfig;
use crate::gateway::queue::{EventQueueHandle, QueueLifecycle};

/// Consumer of ordered events from the poll loop.
///
/// `process` must fully handle one event (translate → backfill → dispatch)
/// before returning; the loop serializes on it deliberately so replies
/// leave in arrival order.
#[async_trait]
pub trait EventSink: Send {
    async fn process(&mut self, event: RawEvent);
}

/// Drives the retrieval cycle for one account session.
pub struct PollLoop {
    api: Arc<dyn ServerApi>,
    config: GatewayConfig,
    account: String,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(
        api: Arc<dyn ServerApi>,
        config: GatewayConfig,
        account: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            config,
            account,
            cancel,
        }
    }

    /// Run until cancellation. Returns the handle as of shutdown.
    pub async fn run(
        &self,
        lifecycle: &mut QueueLifecycle,
        mut handle: EventQueueHandle,
        sink: &mut dyn EventSink,
    ) -> EventQueueHandle {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.api.fetch_events(
                    &handle.queue_id,
                    &handle.cursor,
                    self.config.poll_timeout,
                ) => result,
            };

            match fetched {
                Ok(events) => {
                    for event in events {
                        // Cursor first: the event counts as consumed before
                        // its processing runs or fails.
                        handle.advance(&event.id);
                        sink.process(event).await;
                    }
                }
                Err(e) if e.is_queue_invalid() => {
                    info!(
                        account = %self.account,
                        queue_id = %handle.queue_id,
                        "event queue expired; reregistering"
                    );
                    lifecycle.mark_expired();
                    match lifecycle.reregister().await {
                        Ok(new_handle) => handle = new_handle,
                        Err(e) => {
                            error!(
                                account = %self.account,
                                error = %e,
                                "reregistration failed; backing off"
                            );
                            self.backoff().await;
                        }
                    }
                }
                Err(e) => {
                    error!(account = %self.account, error = %e, "event fetch failed");
                    self.backoff().await;
                }
            }
        }

        lifecycle.abort();
        info!(account = %self.account, "poll loop stopped");
        handle
    }

    /// Fixed-interval backoff that still honors cancellation.
    async fn backoff(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.error_backoff) => {}
        }
    }
}
