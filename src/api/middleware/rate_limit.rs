//! Rate limiting middleware using token bucket algorithm.

use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower::util::Either;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor},
};

type PeerLimiter = GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;
type ProxyLimiter =
    GovernorLayer<SmartIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Per-IP limiter keyed by the peer address, or by proxy headers when the
/// service runs behind a trusted reverse proxy.
pub type RateLimitLayer = Either<PeerLimiter, ProxyLimiter>;

const ADMIN_PER_SECOND: u64 = 1;
const ADMIN_BURST: u32 = 10;

/// Creates the strict rate limiter for the admin routes.
///
/// # Limits
///
/// - **Rate**: 1 request per second
/// - **Burst**: 10 requests
///
/// Requests exceeding the limit receive `429 Too Many Requests`.
///
/// # Key Extraction
///
/// With `behind_proxy`, the client IP comes from `X-Forwarded-For`,
/// `X-Real-IP` or `Forwarded`; otherwise from the socket peer address.
///
/// # Panics
///
/// Never in practice: the limits are non-zero constants.
pub fn admin_layer(behind_proxy: bool) -> RateLimitLayer {
    if behind_proxy {
        let config = GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(ADMIN_PER_SECOND)
            .burst_size(ADMIN_BURST)
            .finish()
            .expect("non-zero rate limit constants");
        Either::Right(GovernorLayer::new(Arc::new(config)))
    } else {
        let config = GovernorConfigBuilder::default()
            .per_second(ADMIN_PER_SECOND)
            .burst_size(ADMIN_BURST)
            .finish()
            .expect("non-zero rate limit constants");
        Either::Left(GovernorLayer::new(Arc::new(config)))
    }
}
