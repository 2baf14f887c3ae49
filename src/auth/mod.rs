// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Calling systems authenticate with a derived secret key sent in the
//! `x-allow-key` header.
//!
//! ## Auth Flow
//!
//! 1. Application is provisioned; its `sk_test_…` / `sk_live_…` keys are
//!    derived from its public identifiers and registered in the
//!    credential store
//! 2. Caller sends `x-allow-key: <secret key>`
//! 3. Server:
//!    - uses the first value if several are present (logged)
//!    - resolves the key to an application id
//!    - loads the live application and its owning company
//!
//! ## Security
//!
//! - Only the KYC create endpoint requires a key; fetch is bound to the
//!   request token instead
//! - Keys are logged masked to their first 6 characters
//! - Inactive applications are treated as missing

pub mod error;
pub mod extractor;
pub mod gate;

pub use error::AuthError;
pub use extractor::{AppAuth, CREDENTIAL_HEADER};
pub use gate::{AuthGate, ResolvedApplication};
