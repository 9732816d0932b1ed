use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

/// Best-effort network origin of the caller
///
/// `None` when neither proxy headers nor the socket address are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOrigin(pub Option<String>);

impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientOrigin(client_origin(&parts.headers, peer)))
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address
pub fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_origin(&headers, Some(peer)).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_origin(&headers, None).as_deref(), Some("10.0.0.2"));

        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_origin(&HeaderMap::new(), Some(peer)).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_nothing_available() {
        assert_eq!(client_origin(&HeaderMap::new(), None), None);
    }
}
