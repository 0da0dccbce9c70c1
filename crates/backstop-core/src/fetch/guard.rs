//! Address guard: refuse hosts that resolve into private or local ranges.

use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use url::{Host, Url};

use super::error::FetchError;

/// Name resolution used by the guard.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system (`getaddrinfo` via tokio).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// True for loopback, private, link-local, CGNAT, unspecified and broadcast
/// IPv4, and for loopback, unspecified, unique-local and link-local IPv6.
/// IPv4-mapped IPv6 is judged by its IPv4 form.
pub fn is_private_addr(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        // 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    let seg = ip.segments();
    // NAT64 64:ff9b::/96 and 6to4 2002::/16 carry an IPv4 destination.
    if seg[0] == 0x64 && seg[1] == 0xff9b && seg[2..6].iter().all(|&s| s == 0) {
        return is_private_v4(embedded_v4(seg[6], seg[7]));
    }
    if seg[0] == 0x2002 {
        return is_private_v4(embedded_v4(seg[1], seg[2]));
    }
    let first = seg[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
}

fn embedded_v4(hi: u16, lo: u16) -> Ipv4Addr {
    Ipv4Addr::from((u32::from(hi) << 16) | u32::from(lo))
}

/// Vet `url`'s host. Returns the address to pin for domain hosts, `None`
/// for IP literals (nothing to resolve).
///
/// The host is refused if any resolved address is private, so a name with
/// one public and one loopback record does not get through.
pub(crate) async fn vet_host(
    url: &Url,
    resolver: &dyn HostResolver,
) -> Result<Option<SocketAddr>, FetchError> {
    let host = url.host().ok_or_else(|| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: "missing host".to_string(),
    })?;

    let literal = match host {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    };
    let host_str = url.host_str().unwrap_or_default().to_string();

    if let Some(addr) = literal {
        if is_private_addr(addr) {
            tracing::warn!(host = %host_str, %addr, "refusing private address");
            return Err(FetchError::PrivateAddress {
                host: host_str,
                addr,
            });
        }
        return Ok(None);
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = resolver
        .resolve(&host_str, port)
        .await
        .map_err(|e| FetchError::Resolve {
            host: host_str.clone(),
            reason: e.to_string(),
        })?;

    if let Some(&addr) = addrs.iter().find(|a| is_private_addr(**a)) {
        tracing::warn!(host = %host_str, %addr, "refusing host that resolves to private address");
        return Err(FetchError::PrivateAddress {
            host: host_str,
            addr,
        });
    }

    match addrs.first() {
        Some(&ip) => {
            tracing::debug!(host = %host_str, %ip, "host vetted");
            Ok(Some(SocketAddr::new(ip, port)))
        }
        None => Err(FetchError::Resolve {
            host: host_str,
            reason: "no addresses".to_string(),
        }),
    }
}
