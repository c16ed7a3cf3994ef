// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the authorization bridge

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grademyprof_common::protocol::ErrorBody;
use thiserror::Error;

/// HTTP-facing bridge errors.
///
/// Authorization failures carry no detail: the specific check that failed is
/// logged, never returned.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request body")]
    InvalidBody,

    #[error("Missing auth token")]
    MissingToken,

    #[error("Invalid authorization format")]
    InvalidAuthorizationFormat,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity provider unavailable")]
    ProviderUnavailable,

    #[error("Failed to generate token")]
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::MissingToken
            | Self::InvalidAuthorizationFormat
            | Self::InvalidCredential
            | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AuthError>;
