//! Failure classification.
//!
//! Failures reach this layer in many shapes: structured API payloads, plain
//! strings, HTTP responses, transport errors. This module normalizes them once
//! into a [`FailureClassification`] so the retry engine can branch on a tag
//! instead of probing fields. Nothing here returns an error or panics.

mod message;
mod quota;
mod status;

pub use message::{format_message, MAX_MESSAGE_CHARS};
pub use quota::quota_kind;
pub use status::{extract_status, parse_retry_after, retry_after};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// How the caller authenticated; selects wording of quota messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    LoginWithGoogle,
    ApiKey,
    VertexAi,
    CloudShell,
}

/// Subscription tier of the account making the calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserTier {
    Free,
    Legacy,
    Standard,
}

/// Which quota, if any, a failure reports as exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuotaKind {
    None,
    /// The paid ("Pro") model quota ran out.
    ProQuota,
    /// Rate limited without a tier-specific marker.
    GenericQuota,
}

/// Retry-relevant category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Timeouts, 5xx, connection resets.
    Transient,
    /// 429 or quota exhaustion.
    RateLimited,
    /// Everything else, including unrecognized shapes.
    Fatal,
    /// The caller's cancellation signal fired.
    Cancelled,
}

impl FailureKind {
    /// True for the kinds the default retry predicate retries.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient | FailureKind::RateLimited)
    }
}

/// Inputs that shape classification but are not part of the failure itself.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    pub auth_type: Option<AuthType>,
    pub user_tier: Option<UserTier>,
    pub current_model: Option<String>,
    pub fallback_model: Option<String>,
}

/// Normalized view of one failure. Built fresh per failure and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureClassification {
    pub status: Option<u16>,
    pub quota_kind: QuotaKind,
    pub kind: FailureKind,
    /// Server-provided delay before the next attempt, if any.
    pub retry_after: Option<Duration>,
    /// The only failure text meant for end users.
    pub message: String,
}

/// A typed failure that can be handed to the classifier.
///
/// Implementors project themselves into the loosely-typed payload shape the
/// classifier inspects, and may pin the kind when they know it better than
/// any status code would (timeouts, cancellation, refused targets).
pub trait Classifiable {
    fn payload(&self) -> Value;

    fn kind_hint(&self) -> Option<FailureKind> {
        None
    }
}

impl Classifiable for Value {
    fn payload(&self) -> Value {
        self.clone()
    }
}

impl Classifiable for String {
    fn payload(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Classifiable for &str {
    fn payload(&self) -> Value {
        Value::String((*self).to_string())
    }
}

/// Classify a loosely-typed failure payload.
pub fn classify_failure(failure: &Value, ctx: &ClassifyContext) -> FailureClassification {
    let status = extract_status(failure);
    let quota = quota_kind(failure, ctx.user_tier);
    FailureClassification {
        status,
        quota_kind: quota,
        kind: kind_for(failure, status, quota),
        retry_after: retry_after(failure),
        message: format_message(
            failure,
            ctx.auth_type,
            ctx.user_tier,
            ctx.current_model.as_deref(),
            ctx.fallback_model.as_deref(),
        ),
    }
}

/// Classify any [`Classifiable`] failure; a kind hint overrides the derived kind.
pub fn classify<F: Classifiable + ?Sized>(failure: &F, ctx: &ClassifyContext) -> FailureClassification {
    let mut classification = classify_failure(&failure.payload(), ctx);
    if let Some(kind) = failure.kind_hint() {
        classification.kind = kind;
    }
    classification
}

fn kind_for(failure: &Value, status: Option<u16>, quota: QuotaKind) -> FailureKind {
    if quota != QuotaKind::None {
        return FailureKind::RateLimited;
    }
    match status {
        Some(429) => FailureKind::RateLimited,
        Some(408) | Some(500..=599) => FailureKind::Transient,
        Some(_) => FailureKind::Fatal,
        None => match status::rpc_status(failure).as_deref() {
            Some("UNAVAILABLE") | Some("DEADLINE_EXCEEDED") => FailureKind::Transient,
            _ => FailureKind::Fatal,
        },
    }
}
