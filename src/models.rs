// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Persisted entities and the request/response shapes of the public API.
//! Field names on the API types are the wire contract.
//!
//! ## Model Categories
//!
//! - **Tenancy**: [`Company`], [`Application`]
//! - **PII subject**: [`Customer`], [`Identity`]
//! - **Onboarding**: [`KycRequest`] and its [`RequestStatus`] state machine
//! - **API**: [`KycRequestInput`], [`InitiateKycResponse`], [`FetchKycResponse`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::crypto::KeyEnvironment;

// =============================================================================
// Tenancy
// =============================================================================

/// A company owning one or more applications.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Stored lowercased; unique.
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppMode {
    Sandbox,
    Live,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppStatus {
    Active,
    Inactive,
}

/// A calling system authenticated by derived secret keys.
///
/// The public keys are generated once at creation and never change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub display_name: String,
    pub test_public_key: String,
    pub live_public_key: String,
    pub mode: AppMode,
    pub status: AppStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn public_key(&self, env: KeyEnvironment) -> &str {
        match env {
            KeyEnvironment::Test => &self.test_public_key,
            KeyEnvironment::Live => &self.live_public_key,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AppStatus::Active
    }
}

// =============================================================================
// Customer & Identity
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Pending,
    Verified,
    Rejected,
}

/// KYC tier, either requested by a KYC request or achieved by a customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord)]
pub enum KycLevel {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "tier_1")]
    Tier1,
    #[serde(rename = "tier_2")]
    Tier2,
    #[serde(rename = "tier_3")]
    Tier3,
}

impl KycLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            KycLevel::None => "none",
            KycLevel::Tier1 => "tier_1",
            KycLevel::Tier2 => "tier_2",
            KycLevel::Tier3 => "tier_3",
        }
    }

    /// Parse a tier a caller may request (`none` is not requestable).
    pub fn parse_requested(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tier_1" => Some(KycLevel::Tier1),
            "tier_2" => Some(KycLevel::Tier2),
            "tier_3" => Some(KycLevel::Tier3),
            _ => None,
        }
    }
}

/// The PII subject, deduplicated by `email_hash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    /// Opaque public token handed to callers.
    pub token: String,
    pub email: String,
    /// SHA-256 of the normalized email; unique.
    pub email_hash: String,
    pub status: CustomerStatus,
    pub kyc_level_achieved: KycLevel,
    pub is_blacklisted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum IdentityType {
    #[serde(rename = "BVN")]
    Bvn,
    #[serde(rename = "NIN")]
    Nin,
}

impl IdentityType {
    /// Case-insensitive match against `BVN` / `NIN`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("BVN") {
            Some(IdentityType::Bvn)
        } else if value.eq_ignore_ascii_case("NIN") {
            Some(IdentityType::Nin)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
    Revoked,
    Suspended,
}

/// Government identifier owned by exactly one customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    /// Envelope-encrypted identity number.
    pub value_encrypted: String,
    pub status: IdentityStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// KYC Request
// =============================================================================

/// Lifecycle of a KYC request.
///
/// ```text
/// initiated -> otp_pending -> kyc_processing -> completed
///     \______________\_______________\________-> failed
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Initiated,
    OtpPending,
    KycProcessing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            RequestStatus::Initiated => 0,
            RequestStatus::OtpPending => 1,
            RequestStatus::KycProcessing => 2,
            RequestStatus::Completed => 3,
            RequestStatus::Failed => 4,
        }
    }

    /// Forward one step at a time, or to `failed` from any live state.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RequestStatus::Failed => true,
            _ => next.rank() == self.rank() + 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Initiated => "initiated",
            RequestStatus::OtpPending => "otp_pending",
            RequestStatus::KycProcessing => "kyc_processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One onboarding attempt. The customer payload is stored only as an envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KycRequest {
    pub id: String,
    /// Caller-supplied, globally unique.
    pub reference: String,
    pub company_id: String,
    pub application_id: String,
    pub redirect_url: String,
    pub kyc_level: KycLevel,
    pub bank_accounts_requested: bool,
    pub encrypted_data: String,
    pub allow_url: String,
    /// Opaque token the end user presents to resume the flow; unique.
    pub kyc_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycRequest {
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expires_at
    }
}

// =============================================================================
// API: Create
// =============================================================================

/// Identity document supplied with a KYC request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IdentityInput {
    /// `BVN` or `NIN` (case-insensitive).
    #[serde(rename = "type", default)]
    pub identity_type: String,
    #[serde(default)]
    pub number: String,
}

/// Customer PII supplied with a KYC request. Encrypted before it is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CustomerInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub identity: IdentityInput,
}

/// Body of `POST /api/v1/allow`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct KycRequestInput {
    #[serde(default)]
    pub customer: CustomerInput,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub redirect_url: String,
    /// `tier_1`, `tier_2` or `tier_3`.
    #[serde(default)]
    pub kyc_level: String,
    #[serde(default)]
    pub bank_accounts: bool,
}

/// Result of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct InitiateKycResponse {
    /// The request token.
    pub id: String,
    /// The customer token.
    pub customer: String,
    pub allow_url: String,
    pub reference: String,
    pub redirect_url: String,
    pub bank_accounts: bool,
    pub kyc_level: KycLevel,
    pub is_blacklisted: bool,
}

impl InitiateKycResponse {
    pub fn new(request: &KycRequest, customer: &Customer) -> Self {
        Self {
            id: request.kyc_token.clone(),
            customer: customer.token.clone(),
            allow_url: request.allow_url.clone(),
            reference: request.reference.clone(),
            redirect_url: request.redirect_url.clone(),
            bank_accounts: request.bank_accounts_requested,
            kyc_level: request.kyc_level,
            is_blacklisted: customer.is_blacklisted,
        }
    }
}

// =============================================================================
// API: Fetch
// =============================================================================

/// Non-secret view of an identity document (the number is never exposed).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IdentityView {
    #[serde(rename = "type")]
    pub identity_type: IdentityType,
    pub status: IdentityStatus,
    pub verified: bool,
}

impl From<&Identity> for IdentityView {
    fn from(identity: &Identity) -> Self {
        Self {
            identity_type: identity.identity_type,
            status: identity.status,
            verified: identity.verified,
        }
    }
}

/// Customer as returned by fetch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CustomerView {
    pub token: String,
    pub email: String,
    pub status: CustomerStatus,
    pub kyc_level_achieved: KycLevel,
    pub is_blacklisted: bool,
    pub identities: Vec<IdentityView>,
}

impl CustomerView {
    pub fn new(customer: &Customer, identities: &[Identity]) -> Self {
        Self {
            token: customer.token.clone(),
            email: customer.email.clone(),
            status: customer.status,
            kyc_level_achieved: customer.kyc_level_achieved,
            is_blacklisted: customer.is_blacklisted,
            identities: identities.iter().map(IdentityView::from).collect(),
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FetchKycResponse {
    pub redirect_url: String,
    pub kyc_level: KycLevel,
    pub bank_accounts_requested: bool,
    pub customer: CustomerView,
    pub status: RequestStatus,
}

// =============================================================================
// API: Envelope
// =============================================================================

/// Standard success wrapper: `{ message, results, error: false }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ApiEnvelope<T> {
    pub message: String,
    pub results: T,
    pub error: bool,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(message: impl Into<String>, results: T) -> Self {
        Self {
            message: message.into(),
            results,
            error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_machine_is_forward_only() {
        use RequestStatus::*;
        assert!(Initiated.can_transition_to(OtpPending));
        assert!(OtpPending.can_transition_to(KycProcessing));
        assert!(KycProcessing.can_transition_to(Completed));
        assert!(!Initiated.can_transition_to(KycProcessing));
        assert!(!Initiated.can_transition_to(Completed));
        assert!(!OtpPending.can_transition_to(Completed));
        assert!(Initiated.can_transition_to(Failed));
        assert!(KycProcessing.can_transition_to(Failed));
        assert!(!KycProcessing.can_transition_to(OtpPending));
        assert!(!OtpPending.can_transition_to(OtpPending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(Completed.is_terminal() && Failed.is_terminal());
        assert!(!Initiated.is_terminal());
    }

    #[test]
    fn wire_names_match_contract() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::KycProcessing).unwrap(),
            r#""kyc_processing""#
        );
        assert_eq!(serde_json::to_string(&KycLevel::Tier2).unwrap(), r#""tier_2""#);
        assert_eq!(serde_json::to_string(&IdentityType::Nin).unwrap(), r#""NIN""#);
        assert_eq!(serde_json::to_string(&AppMode::Sandbox).unwrap(), r#""SANDBOX""#);
    }

    #[test]
    fn parses_identity_types_case_insensitively() {
        assert_eq!(IdentityType::parse("bvn"), Some(IdentityType::Bvn));
        assert_eq!(IdentityType::parse(" Nin "), Some(IdentityType::Nin));
        assert_eq!(IdentityType::parse("passport"), None);
    }

    #[test]
    fn requested_levels_exclude_none() {
        assert_eq!(KycLevel::parse_requested("TIER_3"), Some(KycLevel::Tier3));
        assert_eq!(KycLevel::parse_requested("none"), None);
        assert_eq!(KycLevel::parse_requested(""), None);
    }

    #[test]
    fn request_input_tolerates_missing_fields() {
        let input: KycRequestInput = serde_json::from_str(r#"{"reference":"r"}"#).unwrap();
        assert_eq!(input.reference, "r");
        assert!(input.customer.email.is_empty());
        assert!(!input.bank_accounts);
    }

    #[test]
    fn request_input_reads_identity_type_field() {
        let input: KycRequestInput = serde_json::from_str(
            r#"{"customer":{"identity":{"type":"BVN","number":"1"}}}"#,
        )
        .unwrap();
        assert_eq!(input.customer.identity.identity_type, "BVN");
    }
}
