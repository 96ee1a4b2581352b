//! Runners decide how a dispatched intent is admitted and executed

use async_trait::async_trait;
use hauto_core::{Context, HautoResult};
use hauto_intent::{Intent, RunStatus};
use tracing::{debug, warn};

/// Executes one dispatched (intent, context) pair
///
/// Returning an error marks the dispatch as having raised, which is what
/// [`WaitPolicy::FirstException`](crate::WaitPolicy::FirstException) waits
/// for. A failing intent body is not an error; it is reported through
/// [`RunStatus`].
#[async_trait]
pub trait IntentRunner: Send + Sync + 'static {
    async fn run(&self, intent: Intent, ctx: Context) -> HautoResult<RunStatus>;
}

/// Admission followed by execution, with no lifecycle notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicRunner;

#[async_trait]
impl IntentRunner for BasicRunner {
    async fn run(&self, intent: Intent, ctx: Context) -> HautoResult<RunStatus> {
        if !intent.can_run(&ctx).await? {
            return Ok(RunStatus::Rejected);
        }

        let status = intent.run(ctx).await?;
        match &status {
            RunStatus::Failed(reason) => {
                warn!(intent = %intent.id(), %reason, "Intent body failed")
            }
            RunStatus::Panicked(message) => {
                warn!(intent = %intent.id(), %message, "Intent body panicked")
            }
            RunStatus::Cancelled => debug!(intent = %intent.id(), "Intent body was cancelled"),
            _ => {}
        }
        Ok(status)
    }
}
