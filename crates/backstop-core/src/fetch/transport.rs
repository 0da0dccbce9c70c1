//! The seam between the guard and the wire.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::FetchError;
use crate::classify::parse_retry_after;

/// One vetted GET request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: Url,
    /// Address the guard checked. Set for domain hosts so the transport
    /// connects there instead of resolving the name again.
    pub pinned: Option<SocketAddr>,
    pub timeout: Duration,
    pub max_body_bytes: usize,
    pub user_agent: Option<String>,
}

/// Performs a request that already passed the address guard.
///
/// Implementations must stop work promptly once `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<FetchResponse, FetchError>;
}

/// A complete response. Header names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after").and_then(parse_retry_after)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx response into [`FetchError::Http`].
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(FetchError::Http {
            status: self.status,
            retry_after: self.retry_after(),
            body: self.text(),
        })
    }
}
