// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! GradeMyProf Authorization Bridge Service
//!
//! ## Endpoints
//!
//! - `POST /login`: `{firebase_token, email}` → `{token, email}` (5 rpm per IP)
//! - `GET /verify-token`: `Authorization: Bearer <token>` → `{valid, email}`
//! - `GET /health`
//!
//! ## Configuration
//!
//! Loaded from environment variables, with `.env` support:
//!
//! - `JWT_SECRET`: session signing secret (required)
//! - `FIREBASE_SERVICE_ACCOUNT_KEY` or `FIREBASE_SERVICE_ACCOUNT_PATH` (required)
//! - `BIND_ADDR`: server bind address (default: 0.0.0.0:8080)
//! - `LOGIN_RATE_RPM`: login attempts per minute per IP (default: 5)
//! - `TRUSTED_PROXIES`: comma separated addresses or CIDR blocks whose
//!   `X-Forwarded-For` is believed (default: none, the peer address is used)

use anyhow::Context;
use grademyprof_auth::{build_state, firebase::FirebaseProvider, router, Config};
use grademyprof_common::{RateLimiter, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter reads RUST_LOG
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if dotenv.is_err() {
        info!("No .env file found, using process environment");
    }

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        bind_addr = %config.bind_addr,
        session_ttl_days = config.session_ttl_days,
        login_rate_rpm = config.rate_limit.login_max_requests,
        "Starting authorization bridge"
    );

    let provider = FirebaseProvider::from_config(&config.identity)
        .context("failed to initialise Firebase identity provider")?;
    info!(project_id = %provider.project_id(), "Firebase identity provider ready");

    let state = Arc::new(build_state(&config, Arc::new(provider), Arc::new(SystemClock)));

    let login_limiter = Arc::new(RateLimiter::new(config.rate_limit.login_policy()));
    login_limiter
        .clone()
        .spawn_sweeper(config.rate_limit.sweep_interval());

    if !config.rate_limit.trusted_proxies.is_empty() {
        info!("Forwarding headers honoured from trusted proxies");
    }
    let app = router(state, login_limiter, config.rate_limit.trusted_proxies.clone());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
