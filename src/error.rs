// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::kyc::KycError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
}

/// Error body: `{ "error": true, "message": "...", "error_code": "..." }`.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: bool,
    pub message: String,
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn conflict(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error_code, message)
    }

    pub fn forbidden(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_code, message)
    }

    pub fn gone(error_code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::GONE, error_code, message)
    }

    /// Generic 500; the cause stays in the server log.
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "An internal error occurred",
        )
    }
}

impl From<KycError> for ApiError {
    fn from(err: KycError) -> Self {
        match err {
            KycError::Validation(message) => ApiError::bad_request(message),
            KycError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            e @ KycError::DuplicateReference(_) => {
                ApiError::conflict("duplicate_reference", e.to_string())
            }
            e @ KycError::DuplicateCustomer => ApiError::conflict("duplicate_customer", e.to_string()),
            e @ KycError::DuplicateCompany => ApiError::conflict("duplicate_company", e.to_string()),
            e @ KycError::AlreadyCompleted => ApiError::forbidden("already_completed", e.to_string()),
            e @ KycError::RequestFailed => ApiError::forbidden("request_failed", e.to_string()),
            e @ KycError::TokenExpired => ApiError::gone("token_expired", e.to_string()),
            KycError::Crypto(e) => {
                tracing::error!(error = %e, "Cryptographic failure while serving request");
                ApiError::internal()
            }
            KycError::Serialization(e) => {
                tracing::error!(error = %e, "Serialization failure while serving request");
                ApiError::internal()
            }
            KycError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure while serving request");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: true,
            message: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}
