//! The intent runner installed on the core's bus

use async_trait::async_trait;
use hauto_core::events::{EVT_INTENT_END, EVT_INTENT_START};
use hauto_core::{Context, HautoResult, Parent, Payload};
use hauto_event_bus::IntentRunner;
use hauto_intent::{Intent, RunStatus};
use std::sync::Weak;
use tracing::{debug, error, warn};

use crate::hautomate::Hautomate;

/// Admits, brackets and runs intents on behalf of a [`Hautomate`]
///
/// While the core is ready, every admitted run of a non-meta event is
/// bracketed by `INTENT_START` and `INTENT_END`. Failures of the body are
/// logged and reported as a [`RunStatus`], never raised.
pub(crate) struct CoreRunner {
    core: Weak<Hautomate>,
}

impl CoreRunner {
    pub(crate) fn new(core: Weak<Hautomate>) -> Self {
        Self { core }
    }

    fn notify(&self, event: &str, intent: &Intent, ctx: &Context, status: Option<&RunStatus>) {
        let Some(core) = self.core.upgrade() else {
            return;
        };

        let mut payload = Payload::new();
        payload.insert("intent".into(), intent.id().to_string().into());
        payload.insert("event".into(), ctx.event().as_str().into());
        payload.insert("context".into(), ctx.id().to_string().into());
        if let Some(status) = status {
            payload.insert("status".into(), format!("{status:?}").into());
        }
        core.bus()
            .dispatch(event, Parent::Intent(intent.id()), payload);
    }
}

#[async_trait]
impl IntentRunner for CoreRunner {
    async fn run(&self, intent: Intent, ctx: Context) -> HautoResult<RunStatus> {
        if !intent.can_run(&ctx).await? {
            debug!(event = %ctx.event(), intent = %intent.id(), "Intent not admitted");
            return Ok(RunStatus::Rejected);
        }

        let bracket = !ctx.event().is_meta()
            && self
                .core
                .upgrade()
                .map(|core| core.is_ready())
                .unwrap_or(false);

        if bracket {
            self.notify(EVT_INTENT_START, &intent, &ctx, None);
        }

        let event = ctx.event().clone();
        let notify_ctx = bracket.then(|| ctx.clone());
        let status = intent.run(ctx).await?;

        match &status {
            RunStatus::Failed(reason) => {
                error!(event = %event, intent = %intent.id(), %reason, "Intent failed")
            }
            RunStatus::Panicked(message) => {
                error!(event = %event, intent = %intent.id(), %message, "Intent panicked")
            }
            RunStatus::Cancelled => {
                warn!(event = %event, intent = %intent.id(), "Intent was cancelled")
            }
            RunStatus::Skipped => {
                debug!(event = %event, intent = %intent.id(), "Intent run limit reached")
            }
            RunStatus::Completed | RunStatus::Rejected => {}
        }

        if let Some(ctx) = notify_ctx {
            self.notify(EVT_INTENT_END, &intent, &ctx, Some(&status));
        }
        Ok(status)
    }
}
