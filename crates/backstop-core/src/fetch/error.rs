//! Fetch error type and its mapping into failure classification.

use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use crate::classify::{Classifiable, FailureKind};

/// Error returned by a single guarded fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Refused before any network call.
    #[error("refusing to fetch {host}: it resolves to private or loopback address {addr}")]
    PrivateAddress { host: String, addr: IpAddr },
    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Connect, send or receive failed (reset, refused, empty reply).
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("response body exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },
    /// Response arrived with a non-success status.
    #[error("HTTP {status}")]
    Http {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }

    /// Map a libcurl error; `timeout` is the budget the transfer ran under.
    pub(crate) fn from_curl(e: &curl::Error, timeout: Duration) -> Self {
        if e.is_aborted_by_callback() {
            return FetchError::Cancelled;
        }
        if e.is_operation_timedout() {
            return FetchError::Timeout(timeout);
        }
        if e.is_couldnt_resolve_host() {
            return FetchError::Resolve {
                host: String::new(),
                reason: e.to_string(),
            };
        }
        if e.is_couldnt_connect()
            || e.is_read_error()
            || e.is_recv_error()
            || e.is_send_error()
            || e.is_got_nothing()
        {
            return FetchError::Connection(e.to_string());
        }
        FetchError::Transport(e.to_string())
    }
}

impl Classifiable for FetchError {
    fn payload(&self) -> Value {
        match self {
            FetchError::Http {
                status,
                body,
                retry_after,
            } => {
                let message = if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.clone()
                };
                let mut payload = json!({"status": status, "message": message});
                if let Some(d) = retry_after {
                    payload["retry_after"] = json!(d.as_secs_f64());
                }
                payload
            }
            other => json!({"message": other.to_string()}),
        }
    }

    fn kind_hint(&self) -> Option<FailureKind> {
        match self {
            FetchError::Timeout(_) | FetchError::Connection(_) | FetchError::Resolve { .. } => {
                Some(FailureKind::Transient)
            }
            FetchError::InvalidUrl { .. }
            | FetchError::PrivateAddress { .. }
            | FetchError::BodyTooLarge { .. } => Some(FailureKind::Fatal),
            FetchError::Cancelled => Some(FailureKind::Cancelled),
            FetchError::Http { .. } | FetchError::Transport(_) => None,
        }
    }
}
