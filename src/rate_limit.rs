//! Per-IP rate limiting for the token deletion endpoint.

use crate::Server;
use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::utils::extract_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use nonzero_ext::nonzero;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

/// Keyed limiter allowing `max_requests` per IP per window.
///
/// Implemented as a token bucket with a full-window burst, so a client may
/// spend its whole allowance at once and the 11th call inside the window is
/// the first to be rejected.
pub struct RateLimitService {
    enabled: bool,
    limiter: IpLimiter,
}

impl RateLimitService {
    pub fn new(config: &RateLimitConfig) -> Self {
        let max = NonZeroU32::new(config.max_requests).unwrap_or(nonzero!(1u32));
        let window = Duration::from_secs(config.window_secs.max(1));
        // Period is window/max so the bucket refills the full allowance
        // exactly once per window
        let quota = Quota::with_period(window / max.get())
            .unwrap_or_else(|| Quota::per_minute(max))
            .allow_burst(max);

        Self {
            enabled: config.enabled,
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }
        match self.limiter.check_key(&ip) {
            Ok(_) => {
                debug!(%ip, "Rate limit check passed");
                Ok(())
            }
            Err(_) => {
                warn!(%ip, "Rate limit exceeded");
                Err(AppError::RateLimited)
            }
        }
    }
}

/// Middleware guarding the token deletion endpoint.
pub async fn rate_limit_middleware(
    State(server): State<Server>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let connect_info = req.extensions().get::<ConnectInfo<SocketAddr>>().cloned();
    if let Some(ip) = extract_ip(req.headers(), connect_info.as_ref()) {
        server.rate_limiter.check(ip)?;
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn config(max_requests: u32, window_secs: u64) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            window_secs,
            max_requests,
        }
    }

    #[test]
    fn test_limit_enforced_per_ip() {
        let service = RateLimitService::new(&config(10, 300));
        let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
        let other = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 8));

        for _ in 0..10 {
            assert!(service.check(ip).is_ok());
        }
        // 11th call within the window is rejected
        assert!(matches!(service.check(ip), Err(AppError::RateLimited)));

        // A different client is unaffected
        assert!(service.check(other).is_ok());
    }

    #[test]
    fn test_disabled_limiter_always_passes() {
        let service = RateLimitService::new(&RateLimitConfig {
            enabled: false,
            window_secs: 300,
            max_requests: 1,
        });
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for _ in 0..100 {
            assert!(service.check(ip).is_ok());
        }
    }

    #[tokio::test]
    async fn test_window_refills() {
        let service = RateLimitService::new(&config(2, 1));
        let ip = IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1));

        assert!(service.check(ip).is_ok());
        assert!(service.check(ip).is_ok());
        assert!(service.check(ip).is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(service.check(ip).is_ok());
    }
}
