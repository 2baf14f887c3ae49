// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug)]
pub enum AuthError {
    /// No credential header, or an empty one
    Unauthenticated,
    /// Credential header is not valid visible ASCII
    InvalidCredentialHeader,
    /// Credential does not resolve to any application
    Unauthorized,
    /// Credential resolved, but the application is missing or inactive
    ApplicationNotFound,
    /// Storage failure while resolving the credential
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: bool,
    message: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::InvalidCredentialHeader => "invalid_credential_header",
            AuthError::Unauthorized => "unauthorized",
            AuthError::ApplicationNotFound => "application_not_found",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated
            | AuthError::InvalidCredentialHeader
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::ApplicationNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Unauthenticated => write!(f, "API key is required"),
            AuthError::InvalidCredentialHeader => write!(f, "API key header is malformed"),
            AuthError::Unauthorized => write!(f, "Invalid API key"),
            AuthError::ApplicationNotFound => write!(f, "Application not found"),
            AuthError::Internal(_) => write!(f, "Internal authentication error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Credential resolution failed");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: true,
            message: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
