//! Image URL guard (SSRF prevention)
//!
//! Image URLs come back inside upstream API responses, so they are checked
//! before the download client is allowed to touch them:
//!
//! - the URL must parse and use the `https` scheme
//! - the host must not be `localhost` or a literal loopback, private,
//!   link-local unicast or link-local multicast address
//! - a host name starting with `127.` counts as loopback, which also covers
//!   wildcard DNS names such as `127.0.0.1.nip.io`
//!
//! The check looks at the literal host only. Hostnames are not resolved, so a
//! public name that resolves to a private address at connect time (DNS
//! rebinding) is not caught here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Reason an image URL was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("malformed URL")]
    Malformed,

    #[error("only https URLs are allowed (got '{scheme}')")]
    SchemeNotAllowed { scheme: String },

    #[error("URL has no host")]
    MissingHost,

    #[error("loopback addresses are not allowed")]
    Loopback,

    #[error("private/internal addresses are not allowed")]
    PrivateAddress,
}

/// Validate an image URL before any network call is made
///
/// Returns the parsed URL on success so the caller does not parse twice.
///
/// # Examples
///
/// ```
/// use glm_mcp::glm::url_guard::{validate_image_url, UrlRejection};
///
/// assert!(validate_image_url("https://example.com/image.png").is_ok());
/// assert!(matches!(
///     validate_image_url("http://example.com/image.png"),
///     Err(UrlRejection::SchemeNotAllowed { .. })
/// ));
/// assert_eq!(
///     validate_image_url("https://10.0.0.5/x"),
///     Err(UrlRejection::PrivateAddress)
/// );
/// ```
pub fn validate_image_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw).map_err(|_| UrlRejection::Malformed)?;

    if url.scheme() != "https" {
        return Err(UrlRejection::SchemeNotAllowed {
            scheme: url.scheme().to_string(),
        });
    }

    match url.host() {
        None => return Err(UrlRejection::MissingHost),
        Some(Host::Domain(domain)) => {
            // `url` lowercases domains, so only the trailing-dot form needs care
            if domain == "localhost" || domain == "localhost." || domain.starts_with("127.") {
                return Err(UrlRejection::Loopback);
            }
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlRejection> {
    match ip {
        IpAddr::V4(v4) => check_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            // ::ffff:a.b.c.d is classified as the embedded IPv4 address
            Some(v4) => check_ipv4(v4),
            None => check_ipv6(v6),
        },
    }
}

fn check_ipv4(ip: Ipv4Addr) -> Result<(), UrlRejection> {
    if ip.is_loopback() {
        return Err(UrlRejection::Loopback);
    }
    if ip.is_private() || ip.is_link_local() || is_ipv4_link_local_multicast(ip) {
        return Err(UrlRejection::PrivateAddress);
    }
    Ok(())
}

fn check_ipv6(ip: Ipv6Addr) -> Result<(), UrlRejection> {
    if ip.is_loopback() {
        return Err(UrlRejection::Loopback);
    }
    if ip.is_unique_local() || ip.is_unicast_link_local() || is_ipv6_link_local_multicast(ip) {
        return Err(UrlRejection::PrivateAddress);
    }
    Ok(())
}

/// 224.0.0.0/24
fn is_ipv4_link_local_multicast(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    a == 224 && b == 0 && c == 0
}

/// ffx2::/16 (multicast with link-local scope)
fn is_ipv6_link_local_multicast(ip: Ipv6Addr) -> bool {
    ip.is_multicast() && (ip.segments()[0] & 0x000f) == 0x0002
}
