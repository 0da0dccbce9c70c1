//! Retry loop: run an async operation until success, a terminal failure, or
//! cancellation.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::RetryConfig;
use super::error::RetryError;
use super::escalation::{boxed_operation, BoxOperation, Escalation};
use super::policy::RetryDecision;
use crate::classify::{classify, Classifiable, FailureKind};

/// Per-sequence bookkeeping. Owned by exactly one running loop.
#[derive(Debug)]
struct AttemptState {
    /// 1-based; reset to 1 when escalation swaps the operation.
    attempt: u32,
    /// Invocations made so far, across swaps.
    invocations: u32,
    delay: Duration,
    escalated: bool,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            attempt: 1,
            invocations: 0,
            delay: Duration::ZERO,
            escalated: false,
        }
    }
}

/// Runs `operation` until it succeeds or the config says to stop.
///
/// On a retryable failure, waits for the backoff delay (or the server's
/// retry-after) and tries again. The first rate-limited failure of the
/// sequence is offered to the escalation handler, if one is configured.
/// `cancel` is observed during every attempt, escalation and wait, and always
/// wins: the sequence ends with [`RetryError::Cancelled`] without another attempt.
pub async fn execute_with_retry<T, E, F, Fut>(
    operation: F,
    config: &RetryConfig<T, E>,
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classifiable + Send + 'static,
{
    run_sequence(boxed_operation(operation), config, cancel).await
}

/// Like [`execute_with_retry`] for an operation that is already boxed.
pub async fn run_sequence<T, E>(
    mut operation: BoxOperation<T, E>,
    config: &RetryConfig<T, E>,
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    E: Classifiable,
{
    let started = Instant::now();
    let mut state = AttemptState::new();
    let mut context = Cow::Borrowed(&config.context);

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                attempts: state.invocations,
            });
        }
        state.invocations += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("attempt {} cancelled in flight", state.attempt);
                return Err(RetryError::Cancelled { attempts: state.invocations });
            }
            outcome = operation() => outcome,
        };

        let failure = match outcome {
            Ok(value) => {
                if state.invocations > 1 {
                    tracing::info!(
                        "succeeded on attempt {} ({} invocations)",
                        state.attempt,
                        state.invocations
                    );
                }
                return Ok(value);
            }
            Err(failure) => failure,
        };

        let classification = classify(&failure, &context);
        if classification.kind == FailureKind::Cancelled {
            return Err(RetryError::Cancelled {
                attempts: state.invocations,
            });
        }

        let mut persist = false;
        let mut backoff_hint = None;
        if classification.kind == FailureKind::RateLimited && !state.escalated {
            if let Some(handler) = &config.on_persistent_rate_limit {
                state.escalated = true;
                let decision = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(RetryError::Cancelled { attempts: state.invocations });
                    }
                    decision = handler.escalate(config.auth_context(), &classification) => decision,
                };
                tracing::info!(
                    status = ?classification.status,
                    quota = ?classification.quota_kind,
                    "rate limited on attempt {}; escalation returned {:?}",
                    state.attempt,
                    decision
                );
                match decision {
                    Escalation::Replace(next) => {
                        operation = next;
                        state.attempt = 1;
                        continue;
                    }
                    Escalation::Fallback {
                        operation: next,
                        model,
                    } => {
                        let ctx = context.to_mut();
                        ctx.current_model = Some(model);
                        ctx.fallback_model = None;
                        operation = next;
                        state.attempt = 1;
                        continue;
                    }
                    Escalation::Continue { backoff } => {
                        persist = true;
                        backoff_hint = backoff;
                    }
                    Escalation::Unhandled => {}
                    Escalation::Abort => {
                        return Err(RetryError::Aborted {
                            failure,
                            classification,
                        });
                    }
                }
            }
        }

        let retryable = persist || (config.should_retry)(&classification, config.auth_context());
        // A server-sent retry-after beats the escalation handler's hint.
        let server_delay = classification.retry_after.or(backoff_hint);
        match config.policy.decide(state.attempt, retryable, server_delay) {
            RetryDecision::NoRetry if !retryable => {
                tracing::debug!(
                    status = ?classification.status,
                    "attempt {} failed with non-retryable {:?}",
                    state.attempt,
                    classification.kind
                );
                return Err(RetryError::Fatal {
                    failure,
                    classification,
                    attempts: state.invocations,
                });
            }
            RetryDecision::NoRetry => {
                let elapsed = started.elapsed();
                tracing::warn!(
                    status = ?classification.status,
                    "giving up after {} attempts in {:?}",
                    state.invocations,
                    elapsed
                );
                return Err(RetryError::Exhausted {
                    failure,
                    classification,
                    attempts: state.invocations,
                    elapsed,
                });
            }
            RetryDecision::RetryAfter(delay) => {
                state.delay = delay;
                tracing::debug!(
                    status = ?classification.status,
                    kind = ?classification.kind,
                    "attempt {} failed; retrying in {:?}",
                    state.attempt,
                    state.delay
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!("cancelled while waiting to retry");
                        return Err(RetryError::Cancelled { attempts: state.invocations });
                    }
                    _ = tokio::time::sleep(state.delay) => {}
                }
                state.attempt += 1;
            }
        }
    }
}
