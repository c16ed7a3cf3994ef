// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! GradeMyProf Review API
//!
//! Professor listings and student reviews over a PostgREST data store.
//!
//! - Mutations require a session token, checked against the auth bridge on
//!   every request
//! - Reviews can only be edited or deleted by the student who wrote them
//! - Professor aggregates are recomputed in the background after each mutation
//! - Global, review-create and review-update rate limits per client

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;

use axum::{
    handler::Handler,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get},
    Extension, Router,
};
use grademyprof_common::{enforce_rate_limit, Clock, RateLimiter, SystemClock, TrustedProxies};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use aggregate::AggregatePipeline;
pub use auth::{AuthenticatedUser, BridgeClient};
pub use config::Config;
pub use handlers::AppState;
pub use store::{MemoryStore, ReviewStore, SupabaseStore};

/// The three request limiters, each with its own visitor table, and the
/// proxies trusted to name the client they are keyed on.
#[derive(Clone)]
pub struct Limiters {
    pub global: Arc<RateLimiter>,
    pub create: Arc<RateLimiter>,
    pub update: Arc<RateLimiter>,
    pub proxies: TrustedProxies,
}

impl Limiters {
    pub fn from_config(config: &config::RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &config::RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            global: Arc::new(RateLimiter::with_clock(config.global_policy(), clock.clone())),
            create: Arc::new(RateLimiter::with_clock(config.create_policy(), clock.clone())),
            update: Arc::new(RateLimiter::with_clock(config.update_policy(), clock)),
            proxies: config.trusted_proxies.clone(),
        }
    }

    /// Start one idle-visitor sweeper per table.
    pub fn spawn_sweepers(&self, interval: Duration) {
        for limiter in [&self.global, &self.create, &self.update] {
            limiter.clone().spawn_sweeper(interval);
        }
    }
}

/// CORS restricted to `origins`, allowing the `Authorization` header.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

/// Build the API router.
///
/// Protected routes verify the session first and only then charge the
/// route's own limiter, so anonymous requests never consume a client's
/// review budget.
pub fn router(
    state: Arc<AppState>,
    bridge: Arc<BridgeClient>,
    limiters: &Limiters,
    cors: CorsLayer,
) -> Router {
    let auth = from_fn_with_state(bridge, auth::require_auth);
    let create_limit = from_fn_with_state(limiters.create.clone(), enforce_rate_limit);
    let update_limit = from_fn_with_state(limiters.update.clone(), enforce_rate_limit);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/professors", get(handlers::list_professors))
        .route("/api/professors/{id}", get(handlers::get_professor))
        .route(
            "/api/professors/{id}/reviews",
            get(handlers::list_reviews)
                .post(handlers::create_review.layer(create_limit).layer(auth.clone())),
        )
        .route(
            "/api/professors/{id}/reviews/{review_id}",
            delete(handlers::delete_review.layer(auth.clone()))
                .patch(handlers::update_review.layer(update_limit).layer(auth.clone())),
        )
        .route(
            "/api/professors/{id}/user-review",
            get(handlers::user_review.layer(auth)),
        )
        .layer(from_fn_with_state(limiters.global.clone(), enforce_rate_limit))
        .layer(Extension(limiters.proxies.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
