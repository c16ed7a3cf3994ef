// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Firebase Auth ID token validation.
//!
//! Firebase ID tokens are RS256 JWTs signed by one of Google's rotating
//! `securetoken` keys. Validation fetches the published JWKS, picks the key
//! named by the token's `kid`, and checks signature, issuer
//! (`https://securetoken.google.com/<project>`), audience (`<project>`) and
//! expiry. The algorithm is pinned to RS256 regardless of the token header.

use crate::config::{ConfigError, IdentityConfig};
use crate::identity::{IdentityClaims, IdentityError, IdentityProvider};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use moka::sync::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// JWKS cache TTL. Google rotates securetoken keys every few hours.
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Maximum accepted JWKS response size.
const MAX_JWKS_SIZE: usize = 256 * 1024;

/// Clock skew tolerated on `exp` and `iat`.
const LEEWAY_SECS: u64 = 60;

/// JWKS document (RFC 7517).
#[derive(Debug, Clone, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// Validates Firebase ID tokens for a single project.
pub struct FirebaseProvider {
    project_id: String,
    issuer: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: Cache<String, Arc<JwkSet>>,
}

impl FirebaseProvider {
    /// Build a provider from a project id.
    pub fn new(
        project_id: impl Into<String>,
        jwks_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let project_id = project_id.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "IDENTITY_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;

        Ok(Self {
            issuer: format!("https://securetoken.google.com/{project_id}"),
            project_id,
            jwks_url: jwks_url.into(),
            http,
            keys: Cache::builder()
                .max_capacity(1)
                .time_to_live(JWKS_CACHE_TTL)
                .build(),
        })
    }

    /// Build a provider from the service account named in `config`.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        let account = config.credentials.load()?;
        info!(
            project_id = %account.project_id,
            client_email = ?account.client_email,
            "Loaded Firebase service account"
        );
        Self::new(account.project_id, config.jwks_url.clone(), config.timeout)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        if let Some(jwks) = self.keys.get(&self.jwks_url) {
            if let Some(key) = find_key(&jwks, kid)? {
                return Ok(key);
            }
            debug!(kid, "Key id not in cached JWKS, refreshing");
        }

        let jwks = Arc::new(self.fetch_jwks().await?);
        self.keys.insert(self.jwks_url.clone(), jwks.clone());
        find_key(&jwks, kid)?
            .ok_or_else(|| IdentityError::Rejected(format!("no signing key for kid '{kid}'")))
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, IdentityError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdentityError::Unavailable(format!(
                "JWKS endpoint returned HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("failed to read JWKS: {e}")))?;
        if bytes.len() > MAX_JWKS_SIZE {
            return Err(IdentityError::Unavailable(format!(
                "JWKS response too large: {} bytes",
                bytes.len()
            )));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| IdentityError::Unavailable(format!("failed to parse JWKS: {e}")))
    }
}

fn find_key(jwks: &JwkSet, kid: &str) -> Result<Option<DecodingKey>, IdentityError> {
    let Some(jwk) = jwks.keys.iter().find(|k| k.kid.as_deref() == Some(kid)) else {
        return Ok(None);
    };

    match (jwk.kty.as_str(), jwk.n.as_deref(), jwk.e.as_deref()) {
        ("RSA", Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e)
            .map(Some)
            .map_err(|e| IdentityError::Unavailable(format!("unusable JWK '{kid}': {e}"))),
        (kty, _, _) => Err(IdentityError::Unavailable(format!(
            "unsupported JWK '{kid}' of type {kty}"
        ))),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseProvider {
    async fn validate(&self, assertion: &str) -> Result<IdentityClaims, IdentityError> {
        let header = decode_header(assertion)
            .map_err(|e| IdentityError::Rejected(format!("unreadable token header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Rejected(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Rejected("token header has no kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "aud", "iss"]);
        validation.leeway = LEEWAY_SECS;

        let data = decode::<IdentityClaims>(assertion, &key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    IdentityError::MalformedClaims(e.to_string())
                }
                _ => IdentityError::Rejected(e.to_string()),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(IdentityError::MalformedClaims("empty subject".to_string()));
        }
        Ok(data.claims)
    }
}
