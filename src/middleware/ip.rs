use axum::{
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Resolves the client IP used as the rate-limit key.
///
/// Proxy headers (`X-Forwarded-For`, first hop, then `X-Real-IP`) are honoured only when
/// `trust_proxy` is set; otherwise a client could pick its own bucket. Falls back to the
/// socket address, then loopback (tests and in-process services have no socket).
pub fn extract_client_ip(headers: &HeaderMap, fallback: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|hv| hv.to_str().ok())
            .and_then(|h| h.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|hv| hv.to_str().ok())
            .and_then(|h| h.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }
    fallback.unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Optional extractor for remote socket address. Unlike `ConnectInfo`, this never rejects
/// if the connection info extension is absent (e.g. in tests or custom services).
#[derive(Clone, Copy, Debug, Default)]
pub struct MaybeRemoteAddr(pub Option<SocketAddr>);

impl MaybeRemoteAddr {
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.map(|addr| addr.ip())
    }
}

impl<S> FromRequestParts<S> for MaybeRemoteAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeRemoteAddr(parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn test_proxy_headers_ignored_unless_trusted() {
        let socket = Some(IpAddr::from([192, 0, 2, 1]));
        assert_eq!(extract_client_ip(&forwarded_headers(), socket, false), IpAddr::from([192, 0, 2, 1]));
        assert_eq!(extract_client_ip(&forwarded_headers(), socket, true), IpAddr::from([203, 0, 113, 7]));
    }

    #[test]
    fn test_real_ip_when_forwarded_for_is_garbage() {
        let mut headers = forwarded_headers();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(extract_client_ip(&headers, None, true), IpAddr::from([198, 51, 100, 2]));
    }

    #[test]
    fn test_loopback_fallback() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None, true), IpAddr::from([127, 0, 0, 1]));
    }
}
