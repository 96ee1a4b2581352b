//! Admission pipeline run before every intent body

use futures::stream::{FuturesUnordered, StreamExt};
use hauto_core::{Context, HautoResult};
use tracing::debug;

use crate::check::Check;
use crate::cooldown::Cooldown;

/// Decide whether an intent may run
///
/// Every check starts at once. The first check to reject (or fail) decides
/// the outcome; the others keep running to completion in the background.
/// The cooldown is only consulted once every check has passed, so a
/// rejected firing never spends a token or resets a debounce.
pub async fn all_checks_pass(
    checks: &[Check],
    cooldown: Option<&Cooldown>,
    ctx: &Context,
) -> HautoResult<bool> {
    let mut pending: FuturesUnordered<_> =
        checks.iter().map(|check| check.start(ctx.clone())).collect();

    while let Some(verdict) = pending.next().await {
        if !verdict? {
            debug!(event = %ctx.event(), intent = %ctx.target(), "Check rejected firing");
            return Ok(false);
        }
    }

    match cooldown {
        Some(cooldown) => {
            let admitted = cooldown.admit(ctx).await;
            if !admitted {
                debug!(event = %ctx.event(), intent = %ctx.target(), %cooldown, "Cooldown rejected firing");
            }
            Ok(admitted)
        }
        None => Ok(true),
    }
}
