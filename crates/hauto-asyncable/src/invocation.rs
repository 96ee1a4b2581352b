//! Awaitable handle returned by [`Asyncable::call`](crate::Asyncable::call)

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

/// Why an invocation produced no value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The callable panicked
    #[error("callable panicked: {0}")]
    Panicked(String),

    /// The task running the callable was cancelled
    #[error("callable was cancelled")]
    Cancelled,

    /// A blocking call was attempted from inside a current-thread runtime
    #[error("cannot block on a current-thread scheduler")]
    OnScheduler,

    /// The runtime shut down before the call completed
    #[error("scheduler went away before the call completed")]
    SchedulerGone,
}

impl InvocationError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        InvocationError::Panicked(message)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvocationError::Cancelled)
    }
}

impl From<JoinError> for InvocationError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            InvocationError::from_panic(err.into_panic())
        } else {
            InvocationError::Cancelled
        }
    }
}

enum Inner<R> {
    Ready(Option<Result<R, InvocationError>>),
    Spawned(JoinHandle<R>),
}

/// Handle to a running (or already finished) invocation
///
/// Dropping it detaches the work rather than cancelling it.
pub struct Invocation<R> {
    inner: Inner<R>,
}

// `R` is only ever moved out, never pinned in place.
impl<R> Unpin for Invocation<R> {}

impl<R> Invocation<R> {
    pub(crate) fn ready(result: Result<R, InvocationError>) -> Self {
        Self {
            inner: Inner::Ready(Some(result)),
        }
    }

    pub(crate) fn spawned(handle: JoinHandle<R>) -> Self {
        Self {
            inner: Inner::Spawned(handle),
        }
    }

    /// Whether the result is available without waiting
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Ready(_) => true,
            Inner::Spawned(handle) => handle.is_finished(),
        }
    }
}

impl<R> Future for Invocation<R> {
    type Output = Result<R, InvocationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(result) => Poll::Ready(
                result
                    .take()
                    .expect("Invocation polled after completion"),
            ),
            Inner::Spawned(handle) => Pin::new(handle).poll(cx).map(|r| r.map_err(Into::into)),
        }
    }
}
