// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! GradeMyProf Review API server
//!
//! ## Configuration
//!
//! Loaded from environment variables, with `.env` support:
//!
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: data store (required unless `DATA_BACKEND=memory`)
//! - `AUTH_SERVICE_URL`: authorization bridge (default: http://localhost:8080)
//! - `BIND_ADDR` or `PORT`: listen address (default: 0.0.0.0:4000)
//! - `ALLOWED_ORIGINS`: comma separated CORS origins
//! - `TRUSTED_PROXIES`: comma separated addresses or CIDR blocks whose
//!   `X-Forwarded-For` is believed (default: none, the peer address is used)

use anyhow::Context;
use grademyprof_api::{
    config::DataBackend, cors_layer, router, AggregatePipeline, AppState, BridgeClient, Config,
    Limiters, MemoryStore, ReviewStore, SupabaseStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
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
        auth_service = %config.auth_service_url,
        backend = ?config.backend,
        "Starting review API"
    );

    let store: Arc<dyn ReviewStore> = match &config.backend {
        DataBackend::Supabase { url, anon_key } => {
            info!(url = %url, "Using Supabase data store");
            Arc::new(
                SupabaseStore::new(url, anon_key, config.upstream_timeout)
                    .context("failed to build Supabase client")?,
            )
        }
        DataBackend::Memory => {
            warn!("Using in-memory data store, reviews are lost on restart");
            Arc::new(MemoryStore::demo())
        }
    };

    let bridge = Arc::new(
        BridgeClient::new(&config.auth_service_url, config.upstream_timeout)
            .context("failed to build auth bridge client")?,
    );
    if bridge.health_check().await {
        info!(url = %config.auth_service_url, "Connected to auth bridge");
    } else {
        warn!(
            url = %config.auth_service_url,
            "Auth bridge not reachable, protected routes will answer 503 until it is"
        );
    }

    let state = Arc::new(AppState {
        pipeline: AggregatePipeline::new(store.clone(), config.recompute_concurrency),
        store,
        default_campus: config.default_campus.clone(),
    });

    let limiters = Limiters::from_config(&config.rate_limit);
    limiters.spawn_sweepers(config.rate_limit.sweep_interval());

    let app = router(state, bridge, &limiters, cors_layer(&config.allowed_origins));

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
