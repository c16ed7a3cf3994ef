// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! GradeMyProf Authorization Bridge
//!
//! Exchanges third-party identity assertions for locally signed session
//! tokens, and verifies those session tokens for other services:
//!
//! - Firebase ID token validation against Google's published keys
//! - Claimed email must match the token's email, and be verified
//! - HS256 session tokens valid for 30 days, no server-side state
//! - Login attempts limited to 5 per minute per client

pub mod config;
pub mod error;
pub mod firebase;
pub mod handlers;
pub mod identity;
pub mod session;

use axum::{
    handler::Handler,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use grademyprof_common::{enforce_rate_limit, Clock, RateLimiter, TrustedProxies};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use identity::{IdentityProvider, IdentityVerifier, VerifiedEmail};
pub use session::{SessionIssuer, SessionVerifier};

/// Assemble handler state from configuration and an identity provider.
pub fn build_state(
    config: &Config,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
) -> AppState {
    AppState {
        identity: IdentityVerifier::new(provider),
        issuer: SessionIssuer::new(&config.signing_secret, config.session_ttl(), clock.clone()),
        sessions: SessionVerifier::new(&config.signing_secret, clock),
    }
}

/// Build the bridge router. Only `/login` passes through the login limiter.
///
/// Clients are told apart by peer address, or by `X-Forwarded-For` when the
/// peer is one of `proxies`.
pub fn router(
    state: Arc<AppState>,
    login_limiter: Arc<RateLimiter>,
    proxies: TrustedProxies,
) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/login",
            post(handlers::login.layer(from_fn_with_state(login_limiter, enforce_rate_limit))),
        )
        .route("/verify-token", get(handlers::verify_token))
        .layer(Extension(proxies))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
