use std::fmt;
use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::errors::RemoteFailure;

/// Boxed future produced by one attempt of an operation.
pub type AttemptFuture = Pin<Box<dyn Future<Output = Result<(), RemoteFailure>> + Send>>;

/// A unit of work the coordinator can re-run. The closure is invoked once
/// per attempt; it must be restartable from scratch and should enforce its
/// own deadline (the coordinator never preempts a running attempt).
pub struct RetryableOperation {
    pub id: String,
    /// Short tag correlating this operation with error reports
    /// (e.g. `"sync:push"`).
    pub context: String,
    /// Retry budget; total attempts = 1 + retries_left.
    pub retries_left: u32,
    action: Box<dyn Fn() -> AttemptFuture + Send + Sync>,
}

impl RetryableOperation {
    /// Operation with a generated id.
    pub fn new<F, Fut>(context: impl Into<String>, retries_left: u32, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RemoteFailure>> + Send + 'static,
    {
        Self::with_id(Uuid::new_v4().to_string(), context, retries_left, action)
    }

    /// Operation with a caller-chosen id. Resubmitting an id that survived a
    /// restart in the durable queue adopts that row's remaining budget.
    pub fn with_id<F, Fut>(
        id: impl Into<String>,
        context: impl Into<String>,
        retries_left: u32,
        action: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RemoteFailure>> + Send + 'static,
    {
        Self {
            id: id.into(),
            context: context.into(),
            retries_left,
            action: Box::new(move || Box::pin(action())),
        }
    }

    pub(super) fn attempt(&self) -> AttemptFuture {
        (self.action)()
    }
}

impl fmt::Debug for RetryableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableOperation")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("retries_left", &self.retries_left)
            .finish_non_exhaustive()
    }
}
