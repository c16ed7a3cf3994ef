// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the authorization bridge.
//!
//! Values come from the environment (optionally seeded from a `.env` file).
//! `JWT_SECRET` and one of the Firebase service account sources are required;
//! everything else has a default.

use grademyprof_common::{RateLimitPolicy, TrustedProxies};
use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Google's published signing keys for Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Ten years.
const MAX_SESSION_TTL_DAYS: u64 = 3650;
const MAX_TIMEOUT_SECS: u64 = 300;
/// One day.
const MAX_INTERVAL_SECS: u64 = 86_400;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read service account file {path}: {source}")]
    ServiceAccountFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("service account credentials are not valid JSON: {0}")]
    ServiceAccountJson(#[from] serde_json::Error),
}

/// HMAC key used to sign and verify session tokens.
///
/// Loaded once at startup and never rotated while the process runs.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        Ok(Self(secret.into_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(..)")
    }
}

/// Where the Firebase service account credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Inline JSON blob (`FIREBASE_SERVICE_ACCOUNT_KEY`)
    Inline(String),
    /// Path to a JSON file (`FIREBASE_SERVICE_ACCOUNT_PATH`)
    File(PathBuf),
}

/// The fields of a Google service account file this service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    #[serde(default)]
    pub client_email: Option<String>,
}

impl CredentialSource {
    /// Read and parse the service account.
    pub fn load(&self) -> Result<ServiceAccount, ConfigError> {
        let raw = match self {
            Self::Inline(json) => json.clone(),
            Self::File(path) => std::fs::read_to_string(path).map_err(|source| {
                ConfigError::ServiceAccountFile {
                    path: path.clone(),
                    source,
                }
            })?,
        };

        let account: ServiceAccount = serde_json::from_str(&raw)?;
        if account.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "project_id",
                reason: "service account has an empty project_id".to_string(),
            });
        }
        Ok(account)
    }
}

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub credentials: CredentialSource,
    pub jwks_url: String,
    pub timeout: Duration,
}

/// Rate limiting configuration for the login endpoint.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Login attempts per window per client (default: 5)
    pub login_max_requests: u32,

    /// Window length in seconds (default: 60)
    pub window_secs: u64,

    /// Seconds between idle-visitor sweeps (default: 180)
    pub sweep_interval_secs: u64,

    /// Proxies allowed to name the client in `X-Forwarded-For` (default: none)
    pub trusted_proxies: TrustedProxies,
}

/// Configuration for the authorization bridge.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    pub bind_addr: String,
    pub signing_secret: SigningSecret,
    /// Session lifetime in days (default: 30)
    pub session_ttl_days: u64,
    pub identity: IdentityConfig,
    pub rate_limit: RateLimitConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_session_ttl_days() -> u64 {
    30
}

fn default_login_rate() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    180
}

fn default_identity_timeout_secs() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max_requests: default_login_rate(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            trusted_proxies: TrustedProxies::none(),
        }
    }
}

impl RateLimitConfig {
    pub fn login_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            "login",
            self.login_max_requests,
            Duration::from_secs(self.window_secs),
            "Too many login attempts, try again later",
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
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

        let signing_secret =
            SigningSecret::new(var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?)?;

        let credentials = match (
            var("FIREBASE_SERVICE_ACCOUNT_KEY"),
            var("FIREBASE_SERVICE_ACCOUNT_PATH"),
        ) {
            (Some(json), _) => CredentialSource::Inline(json),
            (None, Some(path)) => CredentialSource::File(PathBuf::from(path)),
            (None, None) => return Err(ConfigError::Missing("FIREBASE_SERVICE_ACCOUNT_PATH")),
        };

        let session_ttl_days = parse_bounded(
            &var,
            "SESSION_TTL_DAYS",
            default_session_ttl_days(),
            1..=MAX_SESSION_TTL_DAYS,
        )?;

        let trusted_proxies = match var("TRUSTED_PROXIES") {
            Some(raw) => TrustedProxies::parse_list(&raw).map_err(|e| ConfigError::Invalid {
                name: "TRUSTED_PROXIES",
                reason: e.to_string(),
            })?,
            None => TrustedProxies::none(),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(default_bind_addr),
            signing_secret,
            session_ttl_days,
            identity: IdentityConfig {
                credentials,
                jwks_url: var("FIREBASE_JWKS_URL").unwrap_or_else(|| FIREBASE_JWKS_URL.to_string()),
                timeout: Duration::from_secs(parse_bounded(
                    &var,
                    "IDENTITY_TIMEOUT_SECS",
                    default_identity_timeout_secs(),
                    1..=MAX_TIMEOUT_SECS,
                )?),
            },
            rate_limit: RateLimitConfig {
                login_max_requests: parse_bounded(
                    &var,
                    "LOGIN_RATE_RPM",
                    default_login_rate(),
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
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_days * 24 * 60 * 60)
    }
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
