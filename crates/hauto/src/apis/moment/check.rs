use async_trait::async_trait;
use hauto_check::{CheckResult, Predicate};
use hauto_core::{Context, Scale};
use tracing::trace;

use super::spec::MomentSpec;

/// Passes once the firing's virtual time reaches a moment
///
/// Moments falling inside the upcoming tick window are waited for, so an
/// intent runs on time rather than up to a tick late. Absolute moments keep
/// passing once due; daily moments pass only on the tick that reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentaryCheck {
    moment: MomentSpec,
}

impl MomentaryCheck {
    pub fn new(moment: impl Into<MomentSpec>) -> Self {
        Self {
            moment: moment.into(),
        }
    }

    pub fn moment(&self) -> MomentSpec {
        self.moment
    }
}

#[async_trait]
impl Predicate for MomentaryCheck {
    async fn evaluate(&self, ctx: &Context) -> CheckResult {
        let when = ctx.when();
        let target = self.moment.next_after(when);

        if self.moment.is_absolute() && target <= when {
            return Ok(true);
        }

        let window = ctx.clock().tick_window();
        let ahead = (target - when).to_std().unwrap_or_default();
        if ahead.as_secs_f64() >= window {
            return Ok(false);
        }

        let nap = ctx.clock().scale_duration(ahead, Scale::ToReal);
        trace!(moment = %self.moment, ?nap, "Moment is due within this tick");
        tokio::time::sleep(nap).await;
        Ok(true)
    }

    fn describe(&self) -> String {
        format!("MomentaryCheck({})", self.moment)
    }
}
