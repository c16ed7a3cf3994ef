// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
// Session verification against the authorization bridge
//
// Protected routes forward the caller's bearer token to the bridge's
// `/verify-token` endpoint and only proceed with a 200 answer. Every other
// outcome rejects the request.

use crate::config::{as_base, ConfigError};
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use grademyprof_common::protocol::{parse_bearer, VerifyResponse};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// The caller of a protected route, as vouched for by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub email: String,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("session rejected by auth service")]
    Rejected,

    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// Auth bridge client
pub struct BridgeClient {
    verify_url: Url,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, ConfigError> {
        let verify_url = as_base(base_url)
            .join("verify-token")
            .map_err(|e| ConfigError::Invalid {
                name: "AUTH_SERVICE_URL",
                reason: e.to_string(),
            })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;

        Ok(Self { verify_url, http })
    }

    /// Ask the bridge who `token` belongs to.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, BridgeError> {
        let response = self
            .http
            .get(self.verify_url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BridgeError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: VerifyResponse = response
                    .json()
                    .await
                    .map_err(|e| BridgeError::Unavailable(format!("unreadable answer: {e}")))?;
                if !body.valid || body.email.is_empty() {
                    return Err(BridgeError::Unavailable(
                        "bridge answered 200 without a valid subject".to_string(),
                    ));
                }
                Ok(AuthenticatedUser { email: body.email })
            }
            StatusCode::UNAUTHORIZED => Err(BridgeError::Rejected),
            other => Err(BridgeError::Unavailable(format!("unexpected status {other}"))),
        }
    }

    /// Health check for the bridge
    pub async fn health_check(&self) -> bool {
        match self.verify_url.join("health") {
            Ok(url) => self
                .http
                .get(url)
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Require a bridge-verified session. Inserts [`AuthenticatedUser`] into the
/// request extensions for the handler.
pub async fn require_auth(
    State(bridge): State<Arc<BridgeClient>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::MissingToken)?;
    let token = value
        .to_str()
        .ok()
        .and_then(parse_bearer)
        .map(str::to_owned)
        .ok_or(ApiError::Unauthorized)?;

    let user = bridge.verify(&token).await.map_err(|err| match err {
        BridgeError::Rejected => {
            debug!("Bridge rejected session token");
            ApiError::Unauthorized
        }
        BridgeError::Unavailable(reason) => {
            warn!(reason = %reason, "Could not verify session token");
            ApiError::AuthUnavailable
        }
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
