// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Identity assertion verification.
//!
//! The identity provider validates the assertion itself (signature, issuer,
//! audience, expiry). On top of that the verifier requires that the email
//! embedded in the assertion is exactly the email the client claimed, and
//! that the provider has marked it verified. A [`VerifiedEmail`] can only be
//! obtained through [`IdentityVerifier::verify_assertion`].

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Claims this service reads from a provider-validated assertion.
///
/// Every field is required; a missing or mistyped field fails parsing
/// instead of being read as a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
}

/// Errors from assertion verification.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("assertion rejected by identity provider: {0}")]
    Rejected(String),

    #[error("assertion claims are malformed: {0}")]
    MalformedClaims(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("assertion email does not match claimed email")]
    EmailMismatch,

    #[error("assertion email is not verified")]
    EmailNotVerified,
}

/// External identity provider that validates raw assertions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate `assertion` and return its claims.
    async fn validate(&self, assertion: &str) -> Result<IdentityClaims, IdentityError>;
}

/// An email address proven by the identity provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VerifiedEmail(String);

impl VerifiedEmail {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for VerifiedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifiedEmail").field(&self.0).finish()
    }
}

impl fmt::Display for VerifiedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns an identity assertion plus a claimed email into a [`VerifiedEmail`].
#[derive(Clone)]
pub struct IdentityVerifier {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub async fn verify_assertion(
        &self,
        assertion: &str,
        claimed_email: &str,
    ) -> Result<VerifiedEmail, IdentityError> {
        let claims = self.provider.validate(assertion).await?;
        debug!(sub = %claims.sub, "Identity provider accepted assertion");

        if claims.email.is_empty() || claims.email != claimed_email {
            return Err(IdentityError::EmailMismatch);
        }
        if !claims.email_verified {
            return Err(IdentityError::EmailNotVerified);
        }

        info!(email = %claims.email, "Identity assertion verified");
        Ok(VerifiedEmail(claims.email))
    }
}
