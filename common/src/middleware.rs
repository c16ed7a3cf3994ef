// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Axum middleware that applies a [`RateLimiter`] to every request it wraps.
//!
//! ```ignore
//! let login = Arc::new(RateLimiter::new(policy));
//! Router::new().route(
//!     "/login",
//!     post(login_handler.layer(from_fn_with_state(login, enforce_rate_limit))),
//! );
//! ```

use crate::limiter::{RateLimitResult, RateLimiter};
use crate::protocol::ErrorBody;
use crate::proxy::TrustedProxies;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;

/// Header reporting how many requests remain in the current window.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Reject requests over the limiter's budget with `429 Too Many Requests`.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&request);

    match limiter.check(&identity).await {
        RateLimitResult::Allowed { remaining, .. } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        RateLimitResult::Limited { retry_after } => {
            // Round up so clients never retry inside the same window
            let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            info!(
                policy = %limiter.policy().name,
                identity = %identity,
                retry_after_secs = retry_secs,
                "Request rate limited"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(ErrorBody::new(limiter.policy().message.clone())),
            )
                .into_response()
        }
    }
}

/// Identify the client behind a request.
///
/// The peer address recorded by `into_make_service_with_connect_info` is the
/// identity. When a [`TrustedProxies`] extension is installed and lists that
/// peer, the right-most untrusted `X-Forwarded-For` hop is used instead, or
/// `X-Real-IP` if the proxy sent no chain.
pub fn client_identity(request: &Request) -> String {
    let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() else {
        return "unknown".to_string();
    };
    let peer = peer.ip().to_canonical();

    let client = match request.extensions().get::<TrustedProxies>() {
        Some(proxies) if proxies.trusts(peer) => forwarded_client(request.headers(), proxies, peer),
        _ => peer,
    };
    client.to_string()
}

fn forwarded_client(headers: &HeaderMap, proxies: &TrustedProxies, peer: IpAddr) -> IpAddr {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(chain) = header("x-forwarded-for") {
        return proxies.resolve(peer, chain);
    }
    header("x-real-ip")
        .and_then(|v| v.parse::<IpAddr>().ok())
        .unwrap_or(peer)
}
