// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Session token issuance and verification.
//!
//! Session tokens are HS256 JWTs carrying `sub` (the verified email), `iat`
//! and `exp`. They are stateless: nothing is stored server side and there is
//! no revocation list, so a token stays valid until `exp`.
//!
//! Verification runs in a fixed order: parse the token, require an HMAC
//! algorithm, check the signature, then check expiry against the injected
//! clock.

use crate::config::SigningSecret;
use crate::identity::VerifiedEmail;
use chrono::{DateTime, TimeZone, Utc};
use grademyprof_common::clock::{to_delta, Clock};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// HMAC algorithms accepted on verification.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed session token.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The subject of a session token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject {
    pub email: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("session lifetime runs past the representable date range")]
    LifetimeOverflow,

    #[error("malformed session token: {0}")]
    Malformed(String),

    #[error("session token uses unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("session token signature is invalid")]
    InvalidSignature,

    #[error("session token has expired")]
    Expired,
}

/// Mints session tokens for verified emails.
pub struct SessionIssuer {
    key: EncodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    pub fn new(secret: &SigningSecret, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
            clock,
        }
    }

    pub fn issue(&self, email: &VerifiedEmail) -> Result<SessionCredential, SessionError> {
        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(to_delta(self.ttl))
            .ok_or(SessionError::LifetimeOverflow)?;
        let claims = SessionClaims {
            sub: email.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(SessionError::Signing)?;

        Ok(SessionCredential {
            token,
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }
}

/// Checks session tokens minted by a [`SessionIssuer`] sharing the same secret.
pub struct SessionVerifier {
    key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl SessionVerifier {
    pub fn new(secret: &SigningSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            clock,
        }
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedSubject, SessionError> {
        let header = decode_header(token).map_err(|e| SessionError::Malformed(e.to_string()))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(SessionError::UnsupportedAlgorithm(header.alg));
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.set_required_spec_claims(&["sub", "exp"]);
        // Expiry is checked below against the injected clock
        validation.validate_exp = false;

        let data = decode::<SessionClaims>(token, &self.key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => SessionError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => SessionError::UnsupportedAlgorithm(header.alg),
                _ => SessionError::Malformed(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| SessionError::Malformed("exp out of range".to_string()))?;
        if self.clock.now() >= expires_at {
            return Err(SessionError::Expired);
        }
        if claims.sub.is_empty() {
            return Err(SessionError::Malformed("empty subject".to_string()));
        }

        Ok(VerifiedSubject { email: claims.sub })
    }
}
