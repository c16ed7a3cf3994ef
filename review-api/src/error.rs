// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the review API

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use grademyprof_common::protocol::ErrorBody;
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Auth service unavailable")]
    AuthUnavailable,

    #[error("Professor not found")]
    ProfessorNotFound,

    #[error("Review not found")]
    ReviewNotFound,

    #[error("Data store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingToken | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AuthUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ProfessorNotFound | Self::ReviewNotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Upstream detail stays in the logs
            Self::Store(err) => {
                error!(error = %err, "Data store request failed");
                "Data store unavailable".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody::new(message))).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
