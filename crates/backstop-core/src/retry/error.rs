//! Terminal outcomes of a retry sequence.

use std::time::Duration;
use thiserror::Error;

use crate::classify::FailureClassification;

/// Why a retry sequence ended without a result.
///
/// Every variant that carries a failure also carries its classification;
/// `classification.message` is the text meant for end users.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The failure was not retryable.
    #[error("{}", .classification.message)]
    Fatal {
        failure: E,
        classification: FailureClassification,
        attempts: u32,
    },
    /// `max_attempts` was reached; `failure` is the last attempt's.
    #[error("gave up after {attempts} attempts in {elapsed:?}: {}", .classification.message)]
    Exhausted {
        failure: E,
        classification: FailureClassification,
        attempts: u32,
        elapsed: Duration,
    },
    /// The caller's cancellation signal fired.
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
    /// The escalation handler asked to stop.
    #[error("{}", .classification.message)]
    Aborted {
        failure: E,
        classification: FailureClassification,
    },
}

impl<E> RetryError<E> {
    pub fn classification(&self) -> Option<&FailureClassification> {
        match self {
            RetryError::Fatal { classification, .. }
            | RetryError::Exhausted { classification, .. }
            | RetryError::Aborted { classification, .. } => Some(classification),
            RetryError::Cancelled { .. } => None,
        }
    }

    /// The underlying failure of the last attempt, if there was one.
    pub fn into_failure(self) -> Option<E> {
        match self {
            RetryError::Fatal { failure, .. }
            | RetryError::Exhausted { failure, .. }
            | RetryError::Aborted { failure, .. } => Some(failure),
            RetryError::Cancelled { .. } => None,
        }
    }

    /// Text to show the end user.
    pub fn user_message(&self) -> &str {
        match self.classification() {
            Some(c) => &c.message,
            None => "Request cancelled.",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}
