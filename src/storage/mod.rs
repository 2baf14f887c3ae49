// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! A single redb file under `DATA_DIR` holds every entity. PII columns are
//! envelope-encrypted before they reach this layer; storage itself only
//! enforces uniqueness and atomicity.
//!
//! ```text
//! {DATA_DIR}/
//!   kyc.redb
//! ```

pub mod credential_cache;
pub mod database;

pub use credential_cache::CredentialStore;
pub use database::{DbError, DbResult, KycDatabase, UniqueKey};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "kyc.redb";
