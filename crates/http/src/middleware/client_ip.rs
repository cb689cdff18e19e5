//! Client address resolution behind a reverse proxy
//!
//! The site runs behind one proxy hop. `X-Forwarded-For` is only honoured
//! when the connection comes from a trusted proxy, and then only its
//! right-most entry, which is the address the proxy itself saw.

use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Header set by the reverse proxy
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolved client address of the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp {
    /// Best guess at the visitor's address
    pub ip: Option<IpAddr>,
    /// Address of the TCP peer, when the server recorded it
    pub peer: Option<SocketAddr>,
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .last()
        .and_then(|entry| entry.parse().ok())
}

/// Pick the client address from the peer and the forwarded headers
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    match peer {
        Some(peer) if trusted_proxies.contains(&peer) => forwarded_for(headers).or(Some(peer)),
        Some(peer) => Some(peer),
        None => forwarded_for(headers),
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            ip: resolve_client_ip(
                &parts.headers,
                peer.map(|addr| addr.ip()),
                &state.site.trusted_proxies,
            ),
            peer,
        })
    }
}
