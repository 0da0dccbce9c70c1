//! Default transport over libcurl.

use async_trait::async_trait;
use curl::easy::{Easy, List};
use std::net::SocketAddr;
use std::str;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::FetchError;
use super::parse::parse_headers;
use super::transport::{FetchResponse, Transport, TransportRequest};

/// Runs each request on the blocking pool with a fresh easy handle.
///
/// Redirects are not followed: a redirect target would bypass the address
/// guard. The progress callback aborts the transfer once the token fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurlTransport;

#[async_trait]
impl Transport for CurlTransport {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<FetchResponse, FetchError> {
        tokio::task::spawn_blocking(move || perform(&request, &cancel))
            .await
            .map_err(|e| FetchError::Transport(format!("transfer task failed: {e}")))?
    }
}

/// Collected output of one transfer.
#[derive(Default)]
struct Received {
    header_lines: Vec<String>,
    body: Vec<u8>,
    overflowed: bool,
}

fn perform(
    request: &TransportRequest,
    cancel: &CancellationToken,
) -> Result<FetchResponse, FetchError> {
    let mut received = Received::default();
    let result = transfer(request, cancel, &mut received);

    let code = match result {
        Ok(code) => code,
        Err(_) if received.overflowed => {
            return Err(FetchError::BodyTooLarge {
                limit: request.max_body_bytes,
            })
        }
        Err(e) => {
            let err = FetchError::from_curl(&e, request.timeout);
            tracing::debug!(url = %request.url, error = %e, "transfer failed");
            return Err(match err {
                FetchError::Resolve { reason, .. } => FetchError::Resolve {
                    host: request.url.host_str().unwrap_or_default().to_string(),
                    reason,
                },
                other => other,
            });
        }
    };

    let status = u16::try_from(code)
        .map_err(|_| FetchError::Transport(format!("invalid status code {code}")))?;
    Ok(FetchResponse {
        status,
        headers: parse_headers(&received.header_lines),
        body: received.body,
    })
}

fn transfer(
    request: &TransportRequest,
    cancel: &CancellationToken,
    received: &mut Received,
) -> Result<u32, curl::Error> {
    let mut easy = Easy::new();
    easy.url(request.url.as_str())?;
    easy.get(true)?;
    easy.follow_location(false)?;
    easy.timeout(request.timeout)?;
    easy.connect_timeout(request.timeout.min(Duration::from_secs(15)))?;
    easy.progress(true)?;
    if let Some(ua) = &request.user_agent {
        easy.useragent(ua)?;
    }
    if let (Some(addr), Some(host)) = (request.pinned, request.url.host_str()) {
        let mut resolve = List::new();
        resolve.append(&resolve_entry(host, addr))?;
        easy.resolve(resolve)?;
    }

    let limit = request.max_body_bytes;
    let Received {
        header_lines,
        body,
        overflowed,
    } = received;
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                header_lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            if body.len() + data.len() > limit {
                *overflowed = true;
                // Short write makes libcurl fail the transfer.
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()?;
    }

    easy.response_code()
}

/// `CURLOPT_RESOLVE` entry mapping `host:port` to the vetted address.
fn resolve_entry(host: &str, addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V4(a) => format!("{host}:{}:{}", a.port(), a.ip()),
        SocketAddr::V6(a) => format!("{host}:{}:[{}]", a.port(), a.ip()),
    }
}
