// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # KYC Services
//!
//! - [`CustomerRegistry`]: find-or-create customers by normalized email hash
//! - [`KycLedger`]: create, fetch and advance KYC requests
//! - [`ApplicationService`]: companies, applications and their secret keys
//!
//! Each service is constructed with the handles it needs; none keeps global
//! state. Cross-request coordination lives in the storage layer's unique
//! indexes.

pub mod applications;
pub mod customers;
pub mod error;
pub mod ledger;

pub use applications::{ApplicationService, NewApplication, ProvisionedApplication};
pub use customers::{CustomerDraft, CustomerRegistry};
pub use error::KycError;
pub use ledger::{CreatedKycRequest, FetchedKycRequest, KycLedger, LedgerSettings};
