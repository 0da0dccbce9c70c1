//! Retry with exponential backoff.
//!
//! This module owns the retry sequence: it runs a caller-supplied async
//! operation, classifies each failure, waits with jittered exponential backoff
//! (or the server's retry-after), offers the first rate limit of a sequence to
//! an escalation handler, and stops on success, a fatal failure, exhaustion,
//! or cancellation.

mod config;
mod error;
mod escalation;
mod policy;
mod run;

pub use config::{default_should_retry, RetryConfig, ShouldRetry};
pub use error::RetryError;
pub use escalation::{boxed_operation, BoxOperation, Escalation, OperationFuture, RateLimitEscalation};
pub use policy::{PolicyError, RetryDecision, RetryPolicy};
pub use run::{execute_with_retry, run_sequence};
