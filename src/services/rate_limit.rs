use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::{clock::QuantaInstant, middleware::NoOpMiddleware};
use tower_governor::{
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::KeyExtractor,
    GovernorError,
};

/// Limiter settings keyed by client address.
pub type ClientLimiterConfig = GovernorConfig<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>>;

/// Best-effort client address for a request.
///
/// Order: first hop of `X-Forwarded-For`, `X-Real-IP`, the socket peer, then
/// loopback. Field gateways usually sit behind the same reverse proxy, so the
/// forwarded headers are trusted.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded: Option<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    let real_ip = || -> Option<IpAddr> {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    forwarded
        .or_else(real_ip)
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Per-client rate limit key. Requests without an identifiable address share
/// the loopback bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIpKeyExtractor;

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Ok(client_ip(req.headers(), peer))
    }
}

/// Build a per-client limiter that sustains `per_second` requests per second
/// and absorbs bursts of up to `burst` requests.
///
/// The builder's own `per_second` is a replenish interval in seconds, so the
/// rate is converted to a period here. Returns `None` when either value is zero.
pub fn client_limiter(per_second: u64, burst: u32) -> Option<ClientLimiterConfig> {
    if per_second == 0 || burst == 0 {
        return None;
    }
    let period = Duration::from_nanos((1_000_000_000 / per_second).max(1));

    GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .period(period)
        .burst_size(burst)
        .finish()
}
