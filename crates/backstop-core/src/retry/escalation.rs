//! One-shot escalation on persistent rate limiting.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::classify::{AuthType, FailureClassification};

/// Future produced by one invocation of an operation.
pub type OperationFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// A zero-argument async operation the engine can invoke repeatedly.
pub type BoxOperation<T, E> = Box<dyn FnMut() -> OperationFuture<T, E> + Send>;

/// Box a closure that returns a future into a [`BoxOperation`].
pub fn boxed_operation<T, E, F, Fut>(mut operation: F) -> BoxOperation<T, E>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::new(move || operation().boxed())
}

/// What the caller wants after the first rate limit of a sequence.
pub enum Escalation<T, E> {
    /// Swap in a different operation (e.g. a fallback model) and restart the
    /// attempt count at 1 without waiting.
    Replace(BoxOperation<T, E>),
    /// Like `Replace`, for an operation that runs against another model.
    /// Later failures in the sequence are classified with `model` as the
    /// current model and no further fallback.
    Fallback {
        operation: BoxOperation<T, E>,
        model: String,
    },
    /// Keep retrying the current operation with backoff, even if the retry
    /// predicate would have given up. `backoff` is used only when the server
    /// did not send its own retry-after.
    Continue { backoff: Option<Duration> },
    /// Not handled; the failure goes through the normal retry predicate.
    Unhandled,
    /// Stop the sequence now and surface the failure.
    Abort,
}

impl<T, E> fmt::Debug for Escalation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Escalation::Replace(_) => f.write_str("Replace(..)"),
            Escalation::Fallback { model, .. } => f
                .debug_struct("Fallback")
                .field("model", model)
                .finish_non_exhaustive(),
            Escalation::Continue { backoff } => {
                f.debug_struct("Continue").field("backoff", backoff).finish()
            }
            Escalation::Unhandled => f.write_str("Unhandled"),
            Escalation::Abort => f.write_str("Abort"),
        }
    }
}

/// Handler invoked at most once per sequence when a failure is rate limited.
///
/// Receives the opaque auth context from the retry config and the
/// classification of the failure that triggered it. Plain closures of the
/// same shape implement this trait.
#[async_trait]
pub trait RateLimitEscalation<T, E>: Send + Sync {
    async fn escalate(
        &self,
        auth: Option<AuthType>,
        failure: &FailureClassification,
    ) -> Escalation<T, E>;
}

#[async_trait]
impl<T, E, F> RateLimitEscalation<T, E> for F
where
    F: Fn(Option<AuthType>, &FailureClassification) -> Escalation<T, E> + Send + Sync,
    T: Send + 'static,
    E: Send + 'static,
{
    async fn escalate(
        &self,
        auth: Option<AuthType>,
        failure: &FailureClassification,
    ) -> Escalation<T, E> {
        self(auth, failure)
    }
}
