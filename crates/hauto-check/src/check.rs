//! Generic admission checks
//!
//! A [`Check`] wraps a predicate which is evaluated against the firing's
//! [`Context`] before an intent runs. `Ok(true)` admits, `Ok(false)`
//! rejects, and `Err(CheckError)` rejects with a reason. A predicate that
//! panics is a defect rather than a rejection; it surfaces as
//! [`HautoError::Defect`].

use async_trait::async_trait;
use hauto_asyncable::{Asyncable, Concurrency, InvocationError};
use hauto_core::{CheckError, Context, HautoError, HautoResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// Result of a single predicate evaluation
pub type CheckResult = Result<bool, CheckError>;

/// Extension point for checks with their own state or async logic
#[async_trait]
pub trait Predicate: Send + Sync + 'static {
    /// Decide whether the intent may run
    async fn evaluate(&self, ctx: &Context) -> CheckResult;

    /// Short label used in logs when the check is unnamed
    fn describe(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }
}

/// A constraint evaluated prior to running an intent
#[derive(Clone)]
pub struct Check {
    name: Option<String>,
    label: String,
    func: Asyncable<Context, CheckResult>,
}

impl Check {
    /// A cheap predicate, evaluated inline on the scheduler
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> CheckResult + Send + Sync + 'static,
    {
        Self::from_asyncable(
            "predicate",
            Asyncable::safe_sync(move |ctx: Context| predicate(&ctx)),
        )
    }

    /// A predicate that may block, evaluated on the blocking pool
    pub fn blocking<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> CheckResult + Send + Sync + 'static,
    {
        Self::from_asyncable(
            "blocking predicate",
            Asyncable::blocking(move |ctx: Context| predicate(&ctx)),
        )
    }

    /// An async predicate
    pub fn from_async<F, Fut>(predicate: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        Self::from_asyncable("async predicate", Asyncable::from_async(predicate))
    }

    /// A check backed by a [`Predicate`] implementation
    pub fn custom<P: Predicate>(predicate: P) -> Self {
        let label = predicate.describe();
        let predicate = Arc::new(predicate);
        let func = Asyncable::from_async(move |ctx: Context| {
            let predicate = predicate.clone();
            async move { predicate.evaluate(&ctx).await }
        });
        Self::from_asyncable(label, func)
    }

    /// Wrap an already-built asyncable predicate
    pub fn from_asyncable(
        label: impl Into<String>,
        func: Asyncable<Context, CheckResult>,
    ) -> Self {
        Self {
            name: None,
            label: label.into(),
            func,
        }
    }

    /// Give the check a name for logs and error messages
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn concurrency(&self) -> Concurrency {
        self.func.concurrency()
    }

    /// Start evaluating against `ctx`
    ///
    /// The predicate is already running when this returns; the future only
    /// collects its verdict, and dropping it does not stop the predicate.
    pub fn start(&self, ctx: Context) -> impl Future<Output = HautoResult<bool>> + Send {
        let invocation = self.func.call(ctx);
        let origin = self.to_string();

        async move {
            match invocation.await {
                Ok(Ok(verdict)) => Ok(verdict),
                Ok(Err(rejection)) => Err(HautoError::Check(rejection)),
                Err(InvocationError::Panicked(message)) => {
                    error!(check = %origin, %message, "Check predicate is defective");
                    Err(HautoError::Defect { origin, message })
                }
                Err(other) => Err(HautoError::Invocation(format!("{origin}: {other}"))),
            }
        }
    }

    /// Evaluate against `ctx` and wait for the verdict
    pub async fn check(&self, ctx: &Context) -> HautoResult<bool> {
        self.start(ctx.clone()).await
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<Check \"{}\" {}>", name, self.label),
            None => write!(f, "<Check {}>", self.label),
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("concurrency", &self.concurrency())
            .finish()
    }
}
