//! The event-queue ingestion core: lifecycle, poll loop, translation,
//! backfill, and dispatch.

pub mod backfill;
pub mod dispatch;
pub mod poll;
pub mod queue;
pub mod session;
pub mod translate;

pub use backfill::ContextBackfiller;
pub use dispatch::ReplyDispatcher;
pub use poll::{EventSink, PollLoop};
pub use queue::{EventQueueHandle, QueueLifecycle, QueueState};
pub use session::start_account;
pub use translate::{strip_tags, translate, SkipReason};
