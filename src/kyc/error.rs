// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors raised by the KYC services.

use crate::crypto::CryptoError;
use crate::models::RequestStatus;
use crate::storage::DbError;

#[derive(Debug, thiserror::Error)]
pub enum KycError {
    /// Missing or invalid caller input.
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("a KYC request with reference '{0}' already exists")]
    DuplicateReference(String),

    #[error("a customer with this email already exists")]
    DuplicateCustomer,

    #[error("a company with this email already exists")]
    DuplicateCompany,

    #[error("KYC request has already been completed")]
    AlreadyCompleted,

    #[error("KYC request has failed")]
    RequestFailed,

    #[error("KYC token has expired")]
    TokenExpired,

    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),
}

impl KycError {
    /// Guard error for a request sitting in a terminal state.
    pub fn terminal(status: RequestStatus) -> Option<Self> {
        match status {
            RequestStatus::Completed => Some(KycError::AlreadyCompleted),
            RequestStatus::Failed => Some(KycError::RequestFailed),
            _ => None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        KycError::Validation(message.into())
    }
}
