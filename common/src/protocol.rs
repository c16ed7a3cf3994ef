// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON bodies exchanged between clients, the auth bridge and the review API.

use serde::{Deserialize, Serialize};

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy(service: &str, version: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.to_string(),
            version: version.to_string(),
        }
    }
}

/// Login request: a Firebase ID token and the email the client claims it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub firebase_token: String,
    pub email: String,
}

/// Session token minted by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
}

/// Successful token verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub email: String,
}

/// Split a `Bearer <token>` authorization header value.
///
/// Returns `None` unless the value is exactly two space separated parts
/// with the `Bearer` scheme.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
    }

    #[test]
    fn test_login_request_requires_both_fields() {
        let ok: Result<LoginRequest, _> =
            serde_json::from_str(r#"{"firebase_token":"t","email":"a@b.c"}"#);
        assert!(ok.is_ok());

        let missing: Result<LoginRequest, _> = serde_json::from_str(r#"{"email":"a@b.c"}"#);
        assert!(missing.is_err());
    }
}
