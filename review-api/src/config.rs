// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the review API.

use grademyprof_common::{RateLimitPolicy, TrustedProxies};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_TIMEOUT_SECS: u64 = 300;
/// One day.
const MAX_INTERVAL_SECS: u64 = 86_400;
const MAX_RECOMPUTE_CONCURRENCY: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where professors and reviews live.
#[derive(Clone, PartialEq, Eq)]
pub enum DataBackend {
    /// Supabase PostgREST endpoint
    Supabase { url: Url, anon_key: String },
    /// Process-local tables, lost on restart
    Memory,
}

impl fmt::Debug for DataBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", &url.as_str())
                .field("anon_key", &"..")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Rate limiting configuration. Each policy gets its own table.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window per client on every route (default: 100)
    pub global_max_requests: u32,

    /// Review submissions per window per client (default: 5)
    pub create_max_requests: u32,

    /// Review edits per window per client (default: 10)
    pub update_max_requests: u32,

    /// Window length in seconds (default: 60)
    pub window_secs: u64,

    /// Seconds between idle-visitor sweeps (default: 180)
    pub sweep_interval_secs: u64,

    /// Proxies allowed to name the client in `X-Forwarded-For` (default: none)
    pub trusted_proxies: TrustedProxies,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_max_requests: default_global_rate(),
            create_max_requests: default_create_rate(),
            update_max_requests: default_update_rate(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            trusted_proxies: TrustedProxies::none(),
        }
    }
}

impl RateLimitConfig {
    fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn global_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            "global",
            self.global_max_requests,
            self.window(),
            "Too many requests, slow down",
        )
    }

    pub fn create_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            "review-create",
            self.create_max_requests,
            self.window(),
            "Too many reviews submitted, try again later",
        )
    }

    pub fn update_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            "review-update",
            self.update_max_requests,
            self.window(),
            "Too many review edits, try again later",
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Configuration for the review API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:4000)
    pub bind_addr: String,
    /// Base URL of the authorization bridge
    pub auth_service_url: Url,
    pub backend: DataBackend,
    /// Timeout applied to every bridge and data store call
    pub upstream_timeout: Duration,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Aggregate recomputations allowed to run at once
    pub recompute_concurrency: usize,
    /// Campus listed when the client does not name one
    pub default_campus: String,
}

fn default_port() -> u16 {
    4000
}

fn default_auth_service_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_allowed_origins() -> String {
    "http://localhost:5173".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_global_rate() -> u32 {
    100
}

fn default_create_rate() -> u32 {
    5
}

fn default_update_rate() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    180
}

fn default_recompute_concurrency() -> usize {
    8
}

fn default_campus() -> String {
    "pilani".to_string()
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = match var("BIND_ADDR") {
            Some(addr) => addr,
            None => format!(
                "0.0.0.0:{}",
                parse_bounded(&var, "PORT", default_port(), 1..=u16::MAX)?
            ),
        };

        let auth_service_url = parse_base_url(
            "AUTH_SERVICE_URL",
            &var("AUTH_SERVICE_URL").unwrap_or_else(default_auth_service_url),
        )?;

        let backend = match var("DATA_BACKEND").as_deref().map(str::trim) {
            Some("memory") => DataBackend::Memory,
            Some("supabase") | None => DataBackend::Supabase {
                url: parse_base_url(
                    "SUPABASE_URL",
                    &var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                )?,
                anon_key: var("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "DATA_BACKEND",
                    reason: format!("unknown backend {other:?}, expected supabase or memory"),
                })
            }
        };

        let allowed_origins = var("ALLOWED_ORIGINS")
            .unwrap_or_else(default_allowed_origins)
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let recompute_concurrency = parse_bounded(
            &var,
            "RECOMPUTE_CONCURRENCY",
            default_recompute_concurrency(),
            1..=MAX_RECOMPUTE_CONCURRENCY,
        )?;

        let trusted_proxies = match var("TRUSTED_PROXIES") {
            Some(raw) => TrustedProxies::parse_list(&raw).map_err(|e| ConfigError::Invalid {
                name: "TRUSTED_PROXIES",
                reason: e.to_string(),
            })?,
            None => TrustedProxies::none(),
        };

        Ok(Self {
            bind_addr,
            auth_service_url,
            backend,
            upstream_timeout: Duration::from_secs(parse_bounded(
                &var,
                "UPSTREAM_TIMEOUT_SECS",
                default_upstream_timeout_secs(),
                1..=MAX_TIMEOUT_SECS,
            )?),
            allowed_origins,
            rate_limit: RateLimitConfig {
                global_max_requests: parse_bounded(
                    &var,
                    "GLOBAL_RATE_RPM",
                    default_global_rate(),
                    1..=u32::MAX,
                )?,
                create_max_requests: parse_bounded(
                    &var,
                    "CREATE_RATE_RPM",
                    default_create_rate(),
                    1..=u32::MAX,
                )?,
                update_max_requests: parse_bounded(
                    &var,
                    "UPDATE_RATE_RPM",
                    default_update_rate(),
                    1..=u32::MAX,
                )?,
                window_secs: parse_bounded(
                    &var,
                    "RATE_WINDOW_SECS",
                    default_window_secs(),
                    1..=MAX_INTERVAL_SECS,
                )?,
                sweep_interval_secs: parse_bounded(
                    &var,
                    "SWEEP_INTERVAL_SECS",
                    default_sweep_interval_secs(),
                    1..=MAX_INTERVAL_SECS,
                )?,
                trusted_proxies,
            },
            recompute_concurrency,
            default_campus: var("DEFAULT_CAMPUS").unwrap_or_else(default_campus),
        })
    }
}

/// `url` with a trailing slash, so that relative joins append to its path
/// instead of replacing the last segment.
pub fn as_base(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            name,
            reason: "not a base URL".to_string(),
        });
    }
    Ok(as_base(&url))
}

/// Parse `name` if set, rejecting values outside `range`.
fn parse_bounded<T, F>(
    var: &F,
    name: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("must be between {} and {}", range.start(), range.end()),
        });
    }
    Ok(value)
}
