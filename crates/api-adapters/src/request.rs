//! Request metadata: the embedding site's origin and the client address.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{ORIGIN, REFERER};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use domains::{DomainError, ValidationErrors};
use url::Url;

const UNKNOWN_ADDR: &str = "0.0.0.0";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Serialized origin of an absolute URL. Opaque origins yield `None`.
fn origin_of(raw: &str) -> Option<String> {
    let origin = Url::parse(raw).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Origin of the page that sent the request: the `Origin` header, else the
/// origin part of `Referer`.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    header_str(headers, ORIGIN.as_str())
        .filter(|o| *o != "null")
        .and_then(origin_of)
        .or_else(|| header_str(headers, REFERER.as_str()).and_then(origin_of))
}

/// Matches the request origin against the configured hosts.
pub fn resolve_origin(headers: &HeaderMap, hosts: &[String]) -> Result<String, DomainError> {
    let origin = request_origin(headers).ok_or_else(|| {
        ValidationErrors::single("origin", "missing Origin or Referer header")
    })?;
    hosts
        .iter()
        .find(|host| host.eq_ignore_ascii_case(&origin))
        .cloned()
        .ok_or_else(|| {
            ValidationErrors::single("origin", format!("{origin} is not an allowed host")).into()
        })
}

/// Address of the client. Forwarding headers are honoured only when the peer
/// is a local reverse proxy, or when no peer address is known.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    match peer {
        Some(ip) if !ip.is_loopback() => ip.to_string(),
        _ => forwarded_for(headers)
            .map(str::to_string)
            .or_else(|| peer.map(|ip| ip.to_string()))
            .unwrap_or_else(|| UNKNOWN_ADDR.to_string()),
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

/// Extractor for [`client_ip`].
#[derive(Debug, Clone)]
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientAddr(client_ip(&parts.headers, peer)))
    }
}
