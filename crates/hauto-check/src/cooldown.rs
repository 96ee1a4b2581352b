//! Cooldowns: stateful checks which limit successive intent execution
//!
//! A cooldown is evaluated last, and only once every other check of the
//! intent has passed, so it never spends a token on a firing that would be
//! rejected anyway. Its state is shared by all firings of the intent and is
//! updated under a short synchronous lock, which serializes concurrent
//! evaluations.

use chrono::{DateTime, Utc};
use hauto_core::{Context, HautoError, HautoResult, Scale};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let elapsed = later - earlier;
    elapsed.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
}

/// Which kind of cooldown a config entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKind {
    Throttle,
    Debounce,
}

/// Which end of a burst a debounce admits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Admit the first call of a burst
    #[default]
    Leading,
    /// Admit the last call of a burst, once it has been quiet for `wait`
    Trailing,
}

/// Declarative cooldown description, e.g. from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Concrete cooldown; a bare cooldown without one cannot be built
    #[serde(default)]
    pub kind: Option<CooldownKind>,

    /// Throttle refill interval or debounce wait, in virtual seconds
    pub seconds: f64,

    /// Throttle bucket size
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,

    /// Debounce edge
    #[serde(default)]
    pub edge: Edge,
}

fn default_max_tokens() -> f64 {
    1.0
}

/// A stateful check which tracks time-based resource use
#[derive(Debug, Clone)]
pub enum Cooldown {
    Throttle(Arc<Throttle>),
    Debounce(Arc<Debounce>),
}

impl Cooldown {
    pub fn throttle(seconds: f64, max_tokens: f64) -> HautoResult<Self> {
        Ok(Cooldown::Throttle(Arc::new(Throttle::new(seconds, max_tokens)?)))
    }

    pub fn debounce(wait: f64, edge: Edge) -> HautoResult<Self> {
        Ok(Cooldown::Debounce(Arc::new(Debounce::new(wait, edge)?)))
    }

    /// Build the cooldown a config entry describes
    pub fn from_config(config: &CooldownConfig) -> HautoResult<Self> {
        match config.kind {
            Some(CooldownKind::Throttle) => Self::throttle(config.seconds, config.max_tokens),
            Some(CooldownKind::Debounce) => Self::debounce(config.seconds, config.edge),
            None => Err(HautoError::config(
                "a cooldown must be either a throttle or a debounce",
            )),
        }
    }

    /// Decide admission for the firing described by `ctx`
    ///
    /// This consumes state; call it exactly once per admission decision.
    pub async fn admit(&self, ctx: &Context) -> bool {
        match self {
            Cooldown::Throttle(throttle) => throttle.acquire(ctx.when()),
            Cooldown::Debounce(debounce) => debounce.admit(ctx).await,
        }
    }
}

impl fmt::Display for Cooldown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cooldown::Throttle(t) => {
                write!(f, "<Throttle tokens={}, seconds={}>", t.max_tokens, t.seconds)
            }
            Cooldown::Debounce(d) => write!(f, "<Debounce wait={}, edge={:?}>", d.wait, d.edge),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_seen: Option<DateTime<Utc>>,
}

/// Token bucket
///
/// Holds up to `max_tokens` tokens and regains one every `seconds` of
/// virtual time. Each admission spends a token.
#[derive(Debug)]
pub struct Throttle {
    seconds: f64,
    max_tokens: f64,
    bucket: Mutex<Bucket>,
}

impl Throttle {
    pub fn new(seconds: f64, max_tokens: f64) -> HautoResult<Self> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(HautoError::config(format!(
                "throttle period must be positive, got {seconds}"
            )));
        }
        if !(max_tokens.is_finite() && max_tokens >= 1.0) {
            return Err(HautoError::config(format!(
                "throttle needs at least one token, got {max_tokens}"
            )));
        }

        Ok(Self {
            seconds,
            max_tokens,
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_seen: None,
            }),
        })
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    /// Tokens currently in the bucket
    pub fn tokens(&self) -> f64 {
        lock(&self.bucket).tokens
    }

    /// Seconds until the next token is available
    pub fn retry_after(&self) -> f64 {
        (1.0 - self.tokens()).max(0.0) * self.seconds
    }

    /// Refill according to the time passed, then try to spend a token
    pub fn acquire(&self, now: DateTime<Utc>) -> bool {
        let mut bucket = lock(&self.bucket);

        match bucket.last_seen {
            Some(last_seen) if bucket.tokens < self.max_tokens => {
                let elapsed = seconds_between(last_seen, now).max(0.0);
                bucket.tokens = (bucket.tokens + elapsed / self.seconds).min(self.max_tokens);
            }
            _ => {}
        }
        bucket.last_seen = Some(now);

        if bucket.tokens < 1.0 {
            trace!(tokens = bucket.tokens, "Throttle rejected");
            return false;
        }

        bucket.tokens -= 1.0;
        true
    }
}

#[derive(Debug, Default)]
struct Window {
    last_seen: Option<DateTime<Utc>>,
    generation: u64,
    pending: Option<oneshot::Sender<()>>,
}

/// Debounce
///
/// With [`Edge::Leading`] the first call of a burst is admitted and the
/// rest are rejected; a burst ends once `wait` seconds pass without any
/// call. With [`Edge::Trailing`] every call waits `wait` seconds and is
/// admitted only if no newer call arrived meanwhile; a superseded call is
/// rejected as soon as it is superseded.
#[derive(Debug)]
pub struct Debounce {
    wait: f64,
    edge: Edge,
    window: Mutex<Window>,
}

impl Debounce {
    pub fn new(wait: f64, edge: Edge) -> HautoResult<Self> {
        if !(wait.is_finite() && wait > 0.0) {
            return Err(HautoError::config(format!(
                "debounce wait must be positive, got {wait}"
            )));
        }

        Ok(Self {
            wait,
            edge,
            window: Mutex::new(Window::default()),
        })
    }

    pub fn wait(&self) -> f64 {
        self.wait
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    pub async fn admit(&self, ctx: &Context) -> bool {
        match self.edge {
            Edge::Leading => self.admit_leading(ctx.when()),
            Edge::Trailing => self.admit_trailing(ctx).await,
        }
    }

    fn admit_leading(&self, now: DateTime<Utc>) -> bool {
        let mut window = lock(&self.window);
        let admit = window
            .last_seen
            .map_or(true, |last_seen| seconds_between(last_seen, now) >= self.wait);
        window.last_seen = Some(now);
        admit
    }

    async fn admit_trailing(&self, ctx: &Context) -> bool {
        let (tx, superseded) = oneshot::channel();
        let generation = {
            let mut window = lock(&self.window);
            if let Some(previous) = window.pending.replace(tx) {
                let _ = previous.send(());
            }
            window.last_seen = Some(ctx.when());
            window.generation += 1;
            window.generation
        };

        let delay = ctx
            .clock()
            .scale_duration(Duration::from_secs_f64(self.wait), Scale::ToReal);

        tokio::select! {
            biased;
            _ = superseded => {
                trace!("Debounce superseded");
                false
            }
            _ = tokio::time::sleep(delay) => {
                let mut window = lock(&self.window);
                if window.generation == generation {
                    window.pending = None;
                }
                true
            }
        }
    }
}
