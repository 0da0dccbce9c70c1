//! Guarded outbound fetch.
//!
//! A single GET with two protections: the host must not resolve into a
//! private or local range (checked before any connection is made), and the
//! whole call is bounded by a timeout that aborts the in-flight transfer.
//! No retries happen here; wrap calls in [`crate::retry::execute_with_retry`]
//! for that.

mod curl_transport;
mod error;
mod guard;
mod parse;
mod transport;

pub use curl_transport::CurlTransport;
pub use error::FetchError;
pub use guard::{is_private_addr, HostResolver, SystemResolver};
pub use transport::{FetchResponse, Transport, TransportRequest};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::FetchSettings;

/// Default cap on response body size (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Fetch client with injectable transport and resolver.
///
/// Cheap to clone; clones share the transport and resolver.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn HostResolver>,
    max_body_bytes: usize,
    user_agent: Option<String>,
}

impl Fetcher {
    /// Curl transport and system resolver.
    pub fn new() -> Self {
        Self::with_transport(CurlTransport)
    }

    pub fn with_transport<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            resolver: Arc::new(SystemResolver),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: Some(default_user_agent()),
        }
    }

    pub fn from_settings(settings: &FetchSettings) -> Self {
        let mut fetcher = Self::new().max_body_bytes(settings.max_body_bytes);
        if let Some(ua) = &settings.user_agent {
            fetcher = fetcher.user_agent(ua.clone());
        }
        fetcher
    }

    pub fn resolver<R: HostResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        self.fetch_with_cancel(url, timeout, &CancellationToken::new())
            .await
    }

    /// Fetch `url`, giving up after `timeout` or when `cancel` fires.
    ///
    /// Resolution and the transfer share the timeout. The token handed to
    /// the transport is cancelled on every exit path, so a timed-out or
    /// dropped call never leaves a transfer running.
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        let parsed = parse_url(url)?;
        let token = cancel.child_token();
        let _abort_on_exit = token.clone().drop_guard();

        let call = async {
            let pinned = guard::vet_host(&parsed, self.resolver.as_ref()).await?;
            let request = TransportRequest {
                url: parsed.clone(),
                pinned,
                timeout,
                max_body_bytes: self.max_body_bytes,
                user_agent: self.user_agent.clone(),
            };
            tracing::debug!(url = %parsed, ?pinned, ?timeout, "fetch");
            self.transport.send(request, token.clone()).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = call => result,
            _ = tokio::time::sleep(timeout) => {
                tracing::debug!(url = %parsed, ?timeout, "fetch timed out");
                Err(FetchError::Timeout(timeout))
            }
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("max_body_bytes", &self.max_body_bytes)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// One guarded GET with the default transport and resolver.
pub async fn guarded_fetch(url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
    Fetcher::new().fetch(url, timeout).await
}

pub(crate) fn default_user_agent() -> String {
    format!("backstop/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.host().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
