//! Handles to dispatched intents and the policies used to await them

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use hauto_core::{HautoError, HautoResult};
use hauto_intent::{Intent, RunStatus};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::{JoinError, JoinHandle};

/// How long [`EventBus::fire`](crate::EventBus::fire) waits for its
/// dispatched intents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return once any intent has finished
    FirstCompleted,
    /// Return once every intent has finished
    AllCompleted,
    /// Return once any intent raises, or when all have finished
    FirstException,
}

/// An intent dispatched on its own task
///
/// Await it to collect the outcome. Dropping it leaves the task running.
#[derive(Debug)]
pub struct PendingRun {
    intent: Intent,
    handle: JoinHandle<HautoResult<RunStatus>>,
}

impl PendingRun {
    pub(crate) fn new(intent: Intent, handle: JoinHandle<HautoResult<RunStatus>>) -> Self {
        Self { intent, handle }
    }

    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task running this intent
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Future for PendingRun {
    type Output = CompletedRun;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let joined = futures::ready!(Pin::new(&mut self.handle).poll(cx));
        let result = flatten(&self.intent, joined);
        Poll::Ready(CompletedRun {
            intent: self.intent.clone(),
            result,
        })
    }
}

fn flatten(
    intent: &Intent,
    joined: Result<HautoResult<RunStatus>, JoinError>,
) -> HautoResult<RunStatus> {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_panic() => {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(HautoError::Defect {
                origin: intent.to_string(),
                message,
            })
        }
        Err(_) => Ok(RunStatus::Cancelled),
    }
}

/// A dispatched intent whose runner has returned
#[derive(Debug)]
pub struct CompletedRun {
    pub intent: Intent,
    pub result: HautoResult<RunStatus>,
}

impl CompletedRun {
    /// Whether the runner failed rather than reporting a status
    pub fn raised(&self) -> bool {
        self.result.is_err()
    }
}

/// What [`EventBus::fire`](crate::EventBus::fire) reports back
#[derive(Debug, Default)]
pub struct FireOutcome {
    pub done: Vec<CompletedRun>,
    pub pending: Vec<PendingRun>,
}

impl FireOutcome {
    /// Number of intents the firing was dispatched to
    pub fn len(&self) -> usize {
        self.done.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs that raised, in completion order
    pub fn raised(&self) -> impl Iterator<Item = &CompletedRun> {
        self.done.iter().filter(|run| run.raised())
    }
}

pub(crate) async fn wait(runs: Vec<PendingRun>, policy: WaitPolicy) -> FireOutcome {
    let mut pending: FuturesUnordered<PendingRun> = runs.into_iter().collect();
    let mut done = Vec::with_capacity(pending.len());

    while let Some(run) = pending.next().await {
        let stop = match policy {
            WaitPolicy::FirstCompleted => true,
            WaitPolicy::FirstException => run.raised(),
            WaitPolicy::AllCompleted => false,
        };
        done.push(run);

        if stop {
            // sweep up anything that finished at the same moment
            while let Some(Some(run)) = pending.next().now_or_never() {
                done.push(run);
            }
            break;
        }
    }

    FireOutcome {
        done,
        pending: pending.into_iter().collect(),
    }
}
