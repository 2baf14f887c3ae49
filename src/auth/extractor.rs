// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated applications.
//!
//! ```rust,ignore
//! async fn my_handler(AppAuth(resolved): AppAuth) -> impl IntoResponse {
//!     // resolved.application, resolved.company
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, ResolvedApplication};
use crate::state::AppState;

/// Header carrying the application's secret key.
pub const CREDENTIAL_HEADER: &str = "x-allow-key";

/// Extractor that requires a valid secret key in [`CREDENTIAL_HEADER`].
pub struct AppAuth(pub ResolvedApplication);

impl FromRequestParts<AppState> for AppAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if an upstream layer already resolved the application
        if let Some(resolved) = parts.extensions.get::<ResolvedApplication>().cloned() {
            return Ok(AppAuth(resolved));
        }

        // Repeated headers are folded into one comma-separated value
        let mut values = Vec::new();
        for value in parts.headers.get_all(CREDENTIAL_HEADER) {
            let value = value
                .to_str()
                .map_err(|_| AuthError::InvalidCredentialHeader)?;
            values.push(value);
        }
        let header = (!values.is_empty()).then(|| values.join(","));

        let resolved = state.auth.authenticate(header.as_deref())?;
        Ok(AppAuth(resolved))
    }
}
