//! Intent: a unit of work awaiting its event

use chrono::{DateTime, Utc};
use hauto_asyncable::{Asyncable, InvocationError};
use hauto_check::{all_checks_pass, Check, Cooldown};
use hauto_core::{Context, EventName, HautoError, HautoResult, IntentId, IntentState};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument, warn};

/// Body of an intent
pub type Handler = Asyncable<Context, anyhow::Result<()>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a single run of an intent body ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Admission was refused by state, limit, checks or cooldown
    ///
    /// Only runners report this; [`Intent::run`] never checks admission.
    Rejected,
    /// A concurrent firing already used up the last permitted run
    Skipped,
    Completed,
    /// The body returned an error
    Failed(String),
    /// The body panicked
    Panicked(String),
    /// The task running the body was cancelled
    Cancelled,
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

struct Inner {
    id: IntentId,
    event: EventName,
    checks: Vec<Check>,
    cooldown: Option<Cooldown>,
    limit: Option<u64>,
    runs: AtomicU64,
    last_ran: Mutex<Option<DateTime<Utc>>>,
    state: Mutex<IntentState>,
    handler: Mutex<Option<Handler>>,
}

/// Work to be done when an event fires
///
/// Cloning is cheap and every clone refers to the same intent, sharing its
/// state, run counter and cooldown.
#[derive(Clone)]
pub struct Intent {
    inner: Arc<Inner>,
}

impl Intent {
    pub(crate) fn assemble(
        event: EventName,
        checks: Vec<Check>,
        cooldown: Option<Cooldown>,
        limit: Option<u64>,
        handler: Option<Handler>,
    ) -> Self {
        let state = if handler.is_some() {
            IntentState::Ready
        } else {
            IntentState::Initialized
        };

        Self {
            inner: Arc::new(Inner {
                id: IntentId::next(),
                event,
                checks,
                cooldown,
                limit,
                runs: AtomicU64::new(0),
                last_ran: Mutex::new(None),
                state: Mutex::new(state),
                handler: Mutex::new(handler),
            }),
        }
    }

    pub fn id(&self) -> IntentId {
        self.inner.id
    }

    /// Event this intent was declared for
    pub fn event(&self) -> &EventName {
        &self.inner.event
    }

    pub fn checks(&self) -> &[Check] {
        &self.inner.checks
    }

    pub fn cooldown(&self) -> Option<&Cooldown> {
        self.inner.cooldown.as_ref()
    }

    /// Maximum number of runs, `None` when unlimited
    pub fn limit(&self) -> Option<u64> {
        self.inner.limit
    }

    /// Number of runs attempted so far, including skipped ones
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Virtual time at which the body last finished
    pub fn last_ran(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_ran)
    }

    pub fn state(&self) -> IntentState {
        *lock(&self.inner.state)
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.inner.handler).is_some()
    }

    /// Attach (or replace) the body
    ///
    /// A declared intent becomes ready. Paused intents stay paused.
    #[instrument(skip(self, handler), fields(intent = %self.inner.id))]
    pub fn bind(&self, handler: Handler) -> HautoResult<()> {
        let mut state = lock(&self.inner.state);
        if *state == IntentState::Cancelled {
            return Err(HautoError::config(format!(
                "{} is cancelled and cannot be bound",
                self.inner.id
            )));
        }

        *lock(&self.inner.handler) = Some(handler);
        if *state == IntentState::Initialized {
            *state = IntentState::Ready;
        }
        debug!(state = %*state, "Bound intent handler");
        Ok(())
    }

    /// Stop admitting firings until [`Intent::unpause`]
    pub fn pause(&self) {
        let mut state = lock(&self.inner.state);
        match *state {
            IntentState::Ready => {
                *state = IntentState::Paused;
                debug!(intent = %self.inner.id, "Paused intent");
            }
            IntentState::Cancelled => {
                warn!(intent = %self.inner.id, "Attempted to pause a cancelled intent")
            }
            other => debug!(intent = %self.inner.id, state = %other, "Pause ignored"),
        }
    }

    pub fn unpause(&self) {
        let mut state = lock(&self.inner.state);
        match *state {
            IntentState::Paused => {
                *state = IntentState::Ready;
                debug!(intent = %self.inner.id, "Unpaused intent");
            }
            IntentState::Cancelled => {
                warn!(intent = %self.inner.id, "Attempted to unpause a cancelled intent")
            }
            other => debug!(intent = %self.inner.id, state = %other, "Unpause ignored"),
        }
    }

    /// Permanently stop admitting firings
    pub fn cancel(&self) {
        let mut state = lock(&self.inner.state);
        if *state != IntentState::Cancelled {
            *state = IntentState::Cancelled;
            debug!(intent = %self.inner.id, "Cancelled intent");
        }
    }

    /// Whether a firing described by `ctx` may run this intent
    pub async fn can_run(&self, ctx: &Context) -> HautoResult<bool> {
        if self.state() != IntentState::Ready {
            return Ok(false);
        }

        if let Some(limit) = self.inner.limit {
            if self.runs() >= limit {
                return Ok(false);
            }
        }

        all_checks_pass(&self.inner.checks, self.inner.cooldown.as_ref(), ctx).await
    }

    /// Run the body, without consulting checks
    ///
    /// The run counter is bumped before the body starts, so of several
    /// firings admitted at once only `limit` ever execute; the rest are
    /// [`RunStatus::Skipped`].
    pub async fn run(&self, ctx: Context) -> HautoResult<RunStatus> {
        let handler = lock(&self.inner.handler)
            .clone()
            .ok_or_else(|| HautoError::config(format!("{} has no handler bound", self.inner.id)))?;

        let runs = self.inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = self.inner.limit {
            if runs > limit {
                debug!(intent = %self.inner.id, runs, limit, "Run limit already reached, skipping");
                return Ok(RunStatus::Skipped);
            }
        }

        let clock = *ctx.clock();
        let status = match handler.call(ctx).await {
            Ok(Ok(())) => RunStatus::Completed,
            Ok(Err(err)) => RunStatus::Failed(format!("{err:#}")),
            Err(InvocationError::Panicked(message)) => RunStatus::Panicked(message),
            Err(InvocationError::Cancelled) => RunStatus::Cancelled,
            Err(other) => RunStatus::Failed(other.to_string()),
        };

        *lock(&self.inner.last_ran) = Some(clock.now());
        Ok(status)
    }
}

impl PartialEq for Intent {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Intent {}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Intent {} event=\"{}\" state={}>",
            self.inner.id,
            self.inner.event,
            self.state()
        )
    }
}

impl fmt::Debug for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intent")
            .field("id", &self.inner.id)
            .field("event", &self.inner.event)
            .field("state", &self.state())
            .field("checks", &self.inner.checks.len())
            .field("limit", &self.inner.limit)
            .field("runs", &self.runs())
            .finish()
    }
}
