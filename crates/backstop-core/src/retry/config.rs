use std::fmt;
use std::sync::Arc;

use super::escalation::RateLimitEscalation;
use super::policy::RetryPolicy;
use crate::classify::{AuthType, ClassifyContext, FailureClassification};

/// Predicate deciding whether a classified failure is worth another attempt.
pub type ShouldRetry = Arc<dyn Fn(&FailureClassification, Option<AuthType>) -> bool + Send + Sync>;

/// Retries transient and rate-limited failures.
pub fn default_should_retry(failure: &FailureClassification, _auth: Option<AuthType>) -> bool {
    failure.kind.is_retryable()
}

/// Everything one retry sequence needs. Borrowed immutably while it runs, so
/// one config can serve many concurrent sequences.
pub struct RetryConfig<T, E> {
    pub policy: RetryPolicy,
    pub should_retry: ShouldRetry,
    pub on_persistent_rate_limit: Option<Arc<dyn RateLimitEscalation<T, E>>>,
    /// Classification inputs; `context.auth_type` is the auth context passed
    /// to the predicate and the escalation handler.
    pub context: ClassifyContext,
}

impl<T, E> RetryConfig<T, E> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            should_retry: Arc::new(default_should_retry),
            on_persistent_rate_limit: None,
            context: ClassifyContext::default(),
        }
    }

    pub fn with_should_retry<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&FailureClassification, Option<AuthType>) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn with_escalation<H>(mut self, handler: H) -> Self
    where
        H: RateLimitEscalation<T, E> + 'static,
    {
        self.on_persistent_rate_limit = Some(Arc::new(handler));
        self
    }

    pub fn with_context(mut self, context: ClassifyContext) -> Self {
        self.context = context;
        self
    }

    pub fn auth_context(&self) -> Option<AuthType> {
        self.context.auth_type
    }
}

impl<T, E> Default for RetryConfig<T, E> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<T, E> fmt::Debug for RetryConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("policy", &self.policy)
            .field("escalation", &self.on_persistent_rate_limit.is_some())
            .field("context", &self.context)
            .finish()
    }
}
