//! Uniform non-blocking invocation for sync and async callables
//!
//! Handlers come in three flavours, chosen once when the [`Asyncable`] is
//! built and never re-inspected per call:
//!
//! - **async**: the callable returns a future, which is spawned as a task
//! - **safe-sync**: a short, non-blocking closure, run inline on the caller
//! - **potentially-unsafe-sync**: anything that may block; it is moved onto
//!   the runtime's bounded blocking pool
//!
//! Every flavour returns an [`Invocation`], an awaitable handle. The work
//! starts as soon as `call` returns; dropping the handle never cancels it.

mod invocation;

pub use invocation::{Invocation, InvocationError};

use futures::future::BoxFuture;
use futures::FutureExt;
use hauto_core::HautoError;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tracing::trace;

/// Async handler function type
pub type AsyncFn<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, R> + Send + Sync>;

/// Sync handler function type
pub type SyncFn<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;

/// How an [`Asyncable`] runs its callable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Concurrency {
    Async,
    SafeSync,
    PotentiallyUnsafeSync,
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Concurrency::Async => "async",
            Concurrency::SafeSync => "safe_sync",
            Concurrency::PotentiallyUnsafeSync => "potentially_unsafe_sync",
        };
        f.write_str(s)
    }
}

enum Strategy<A, R> {
    Async(AsyncFn<A, R>),
    SafeSync(SyncFn<A, R>),
    Blocking(SyncFn<A, R>),
}

impl<A, R> Clone for Strategy<A, R> {
    fn clone(&self) -> Self {
        match self {
            Strategy::Async(f) => Strategy::Async(f.clone()),
            Strategy::SafeSync(f) => Strategy::SafeSync(f.clone()),
            Strategy::Blocking(f) => Strategy::Blocking(f.clone()),
        }
    }
}

/// A callable turned into an async version of itself
pub struct Asyncable<A, R> {
    strategy: Strategy<A, R>,
}

impl<A, R> Clone for Asyncable<A, R> {
    fn clone(&self) -> Self {
        Self {
            strategy: self.strategy.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Asyncable<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asyncable")
            .field("concurrency", &self.concurrency())
            .finish()
    }
}

impl<A, R> Asyncable<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Wrap a plain sync callable
    ///
    /// Nothing is known about an untagged closure, so it is treated as
    /// potentially blocking and runs on the blocking pool. Use
    /// [`Asyncable::safe_sync`] for closures that are known to be cheap.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::blocking(f)
    }

    /// Wrap a callable returning a future
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let f: AsyncFn<A, R> = Arc::new(move |arg| f(arg).boxed());
        Self {
            strategy: Strategy::Async(f),
        }
    }

    /// Wrap a cheap sync callable that is safe to run on the scheduler
    pub fn safe_sync<F>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            strategy: Strategy::SafeSync(Arc::new(f)),
        }
    }

    /// Wrap a sync callable that might block
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            strategy: Strategy::Blocking(Arc::new(f)),
        }
    }

    pub fn concurrency(&self) -> Concurrency {
        match self.strategy {
            Strategy::Async(_) => Concurrency::Async,
            Strategy::SafeSync(_) => Concurrency::SafeSync,
            Strategy::Blocking(_) => Concurrency::PotentiallyUnsafeSync,
        }
    }

    /// Start the callable and return a handle to its result
    ///
    /// Async and blocking callables need a Tokio runtime context.
    pub fn call(&self, arg: A) -> Invocation<R> {
        trace!(concurrency = %self.concurrency(), "Invoking asyncable");

        match &self.strategy {
            Strategy::Async(f) => Invocation::spawned(tokio::spawn(f(arg))),
            Strategy::SafeSync(f) => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| f(arg)))
                    .map_err(InvocationError::from_panic);
                Invocation::ready(result)
            }
            Strategy::Blocking(f) => {
                let f = f.clone();
                Invocation::spawned(tokio::task::spawn_blocking(move || f(arg)))
            }
        }
    }

    /// Call synchronously and block until the result
    ///
    /// The call is marshalled onto the runtime behind `handle`, so this
    /// works from foreign threads and from the blocking pool. On a
    /// multi-thread runtime the wait goes through
    /// [`tokio::task::block_in_place`], which hands the worker's queue to
    /// another thread first. A current-thread runtime cannot do that, so
    /// any thread inside one gets [`InvocationError::OnScheduler`] and must
    /// await [`Asyncable::call`] instead.
    pub fn call_threadsafe(&self, handle: &Handle, arg: A) -> Result<R, InvocationError> {
        let flavor = Handle::try_current()
            .ok()
            .map(|current| current.runtime_flavor());
        if flavor == Some(RuntimeFlavor::CurrentThread) {
            return Err(InvocationError::OnScheduler);
        }

        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        handle.spawn(async move {
            let result = this.call(arg).await;
            let _ = tx.send(result);
        });

        let received = match flavor {
            None => rx.blocking_recv(),
            Some(_) => tokio::task::block_in_place(|| rx.blocking_recv()),
        };
        received.map_err(|_| InvocationError::SchedulerGone)?
    }
}

impl<A, R> TryFrom<BoxFuture<'static, R>> for Asyncable<A, R> {
    type Error = HautoError;

    /// A future that already exists can run once at most, so it can never
    /// back a re-invocable handler.
    fn try_from(_: BoxFuture<'static, R>) -> Result<Self, Self::Error> {
        Err(HautoError::config(
            "an already-created future was provided; pass the function producing it instead",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn trials() -> Vec<(&'static str, Asyncable<(), i32>)> {
        vec![
            ("safe_sync", Asyncable::safe_sync(|_| 1)),
            ("blocking", Asyncable::blocking(|_| 1)),
            ("new", Asyncable::new(|_| 1)),
            ("async", Asyncable::from_async(|_| async { 1 })),
        ]
    }

    #[test]
    fn test_concurrency_is_decided_at_construction() {
        let kinds: Vec<_> = trials().iter().map(|(_, a)| a.concurrency()).collect();
        assert_eq!(
            kinds,
            vec![
                Concurrency::SafeSync,
                Concurrency::PotentiallyUnsafeSync,
                Concurrency::PotentiallyUnsafeSync,
                Concurrency::Async,
            ]
        );
    }

    #[tokio::test]
    async fn test_runs_from_runtime() {
        for (name, awt) in trials() {
            let r = awt.call(()).await;
            assert_eq!(r.unwrap(), 1, "{name}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_from_foreign_thread() {
        let handle = Handle::current();
        for (name, awt) in trials() {
            let handle = handle.clone();
            let r = thread::spawn(move || awt.call_threadsafe(&handle, ()))
                .join()
                .unwrap();
            assert_eq!(r.unwrap(), 1, "{name}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_runs_from_blocking_pool() {
        let handle = Handle::current();
        for (name, awt) in trials() {
            let handle = handle.clone();
            let r = tokio::task::spawn_blocking(move || awt.call_threadsafe(&handle, ()))
                .await
                .unwrap();
            assert_eq!(r.unwrap(), 1, "{name}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_body_calls_another_asyncable() {
        let handle = Handle::current();
        let double: Asyncable<i32, i32> = Asyncable::from_async(|n| async move { n * 2 });
        let outer: Asyncable<i32, Result<i32, InvocationError>> =
            Asyncable::blocking(move |n| double.call_threadsafe(&handle, n));

        assert_eq!(outer.call(21).await.unwrap(), Ok(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_threadsafe_from_multi_thread_worker() {
        let awt: Asyncable<(), i32> = Asyncable::from_async(|_| async { 1 });
        let r = awt.call_threadsafe(&Handle::current(), ());
        assert_eq!(r, Ok(1));
    }

    #[tokio::test]
    async fn test_threadsafe_refuses_current_thread_scheduler() {
        let awt: Asyncable<(), i32> = Asyncable::safe_sync(|_| 1);
        let r = awt.call_threadsafe(&Handle::current(), ());
        assert!(matches!(r, Err(InvocationError::OnScheduler)));
    }

    #[test]
    fn test_debug_shows_concurrency() {
        let awt: Asyncable<(), i32> = Asyncable::blocking(|_| 1);
        assert_eq!(
            format!("{awt:?}"),
            "Asyncable { concurrency: PotentiallyUnsafeSync }"
        );
    }

    #[tokio::test]
    async fn test_safe_sync_runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let awt = Asyncable::safe_sync(move |n: usize| c.fetch_add(n, Ordering::SeqCst));

        let handle = awt.call(5);
        // done before the handle is ever polled
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_panics_become_errors() {
        let sync: Asyncable<u32, u32> = Asyncable::safe_sync(|d| 10 / d);
        let err = sync.call(0).await.unwrap_err();
        assert!(matches!(err, InvocationError::Panicked(_)));

        let blocking: Asyncable<(), ()> = Asyncable::blocking(|_| panic!("boom"));
        let err = blocking.call(()).await.unwrap_err();
        assert!(matches!(err, InvocationError::Panicked(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_dropping_handle_does_not_cancel() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let awt = Asyncable::from_async(move |_: ()| {
            let c = c.clone();
            async move {
                tokio::task::yield_now().await;
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        drop(awt.call(()));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_started_future_is_rejected() {
        let fut: BoxFuture<'static, i32> = async { 1 }.boxed();
        let r: Result<Asyncable<(), i32>, _> = Asyncable::try_from(fut);
        assert!(matches!(r, Err(HautoError::Configuration(_))));
    }
}
