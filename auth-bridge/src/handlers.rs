// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the authorization bridge.
//!
//! `POST /login` exchanges a Firebase ID token for a session token.
//! `GET /verify-token` is called by the review API on every protected
//! request and answers with the session's subject.

use crate::error::{AuthError, Result};
use crate::identity::{IdentityError, IdentityVerifier};
use crate::session::{SessionIssuer, SessionVerifier};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Json,
};
use grademyprof_common::protocol::{
    parse_bearer, HealthResponse, LoginRequest, LoginResponse, VerifyResponse,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared application state.
pub struct AppState {
    pub identity: IdentityVerifier,
    pub issuer: SessionIssuer,
    pub sessions: SessionVerifier,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        "grademyprof-auth",
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Exchange a Firebase ID token for a session token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(req) = body.map_err(|rejection| {
        debug!(error = %rejection, "Rejected login body");
        AuthError::InvalidBody
    })?;

    if req.firebase_token.is_empty() || req.email.is_empty() {
        return Err(AuthError::InvalidBody);
    }

    let email = state
        .identity
        .verify_assertion(&req.firebase_token, &req.email)
        .await
        .map_err(|err| match err {
            IdentityError::Unavailable(reason) => {
                error!(reason = %reason, "Identity provider unavailable");
                AuthError::ProviderUnavailable
            }
            other => {
                warn!(claimed_email = %req.email, error = %other, "Login rejected");
                AuthError::InvalidCredential
            }
        })?;

    let credential = state.issuer.issue(&email).map_err(|err| {
        error!(error = %err, "Failed to sign session token");
        AuthError::Internal
    })?;

    info!(
        email = %credential.subject,
        expires_at = %credential.expires_at,
        "Issued session token"
    );

    Ok(Json(LoginResponse {
        token: credential.token,
        email: credential.subject,
    }))
}

/// Verify a bearer session token.
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationFormat)?;
    let token = parse_bearer(value).ok_or(AuthError::InvalidAuthorizationFormat)?;

    let subject = state.sessions.verify(token).map_err(|err| {
        debug!(error = %err, "Session token rejected");
        AuthError::InvalidToken
    })?;

    Ok(Json(VerifyResponse {
        valid: true,
        email: subject.email,
    }))
}
