// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! KYC request ledger.
//!
//! Creates requests with their PII sealed in an envelope, enforces the
//! unique caller reference, and serves token-bound reads guarded by the
//! terminal states.
//!
//! ## Lifecycle
//!
//! ```text
//! create ──> initiated ──> otp_pending ──> kyc_processing ──> completed
//!                │              │                │
//!                └──────────────┴────────────────┴──────────> failed
//! ```
//!
//! Status changes come only from the external verification workflow via
//! [`KycLedger::advance_status`]. The ledger never moves a request itself.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use super::{CustomerRegistry, KycError};
use crate::crypto::{generate_hex_token, CryptoEnvelope};
use crate::models::{
    Application, Customer, CustomerView, FetchKycResponse, Identity, IdentityType, KycLevel,
    KycRequest, KycRequestInput, RequestStatus,
};
use crate::storage::{DbError, KycDatabase, UniqueKey};

/// Lifetime of a freshly issued request token.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Default base URL the request token is appended to.
pub const DEFAULT_ALLOW_URL_BASE: &str = "http://127.0.0.1:5173/";

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Base of the end-user allow URL; must end in `/`.
    pub allow_url_base: Url,
    /// Reject fetches of expired tokens with `TokenExpired`.
    pub enforce_token_expiry: bool,
}

/// A request together with the customer it was filed for.
#[derive(Debug, Clone)]
pub struct CreatedKycRequest {
    pub request: KycRequest,
    pub customer: Customer,
}

/// Result of a token-bound fetch.
#[derive(Debug, Clone)]
pub struct FetchedKycRequest {
    pub request: KycRequest,
    pub customer: Customer,
    pub identities: Vec<Identity>,
}

impl FetchedKycRequest {
    /// Public shape of the fetch; carries no decrypted PII beyond the email.
    pub fn to_response(&self) -> FetchKycResponse {
        FetchKycResponse {
            redirect_url: self.request.redirect_url.clone(),
            kyc_level: self.request.kyc_level,
            bank_accounts_requested: self.request.bank_accounts_requested,
            customer: CustomerView::new(&self.customer, &self.identities),
            status: self.request.status,
        }
    }
}

/// The one field of the sealed payload needed to find the customer again.
#[derive(Deserialize)]
struct SealedCustomer {
    email: String,
}

pub struct KycLedger {
    db: Arc<KycDatabase>,
    envelope: Arc<CryptoEnvelope>,
    customers: Arc<CustomerRegistry>,
    settings: LedgerSettings,
}

impl KycLedger {
    pub fn new(
        db: Arc<KycDatabase>,
        envelope: Arc<CryptoEnvelope>,
        customers: Arc<CustomerRegistry>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            db,
            envelope,
            customers,
            settings,
        }
    }

    /// File a new KYC request on behalf of `application`.
    pub fn create(
        &self,
        application: &Application,
        input: &KycRequestInput,
    ) -> Result<CreatedKycRequest, KycError> {
        let reference = input.reference.trim();
        if reference.is_empty() {
            return Err(KycError::validation("reference is required"));
        }
        // Fast path only; the unique index decides under contention
        if self.db.count_by_reference(reference)? > 0 {
            return Err(KycError::DuplicateReference(reference.to_string()));
        }

        let kyc_level = validate(input)?;

        // Written together with the request below, so a rejected request
        // leaves no customer behind
        let draft = self
            .customers
            .prepare(&input.customer.email, &input.customer.identity)?;

        let sealed = serde_json::to_vec(&input.customer)?;
        let encrypted_data = self.envelope.encrypt(&sealed)?;

        let kyc_token = generate_hex_token()?;
        let allow_url = format!("{}{kyc_token}", self.settings.allow_url_base);

        let now = Utc::now();
        let request = KycRequest {
            id: Uuid::new_v4().simple().to_string(),
            reference: reference.to_string(),
            company_id: application.company_id.clone(),
            application_id: application.id.clone(),
            redirect_url: input.redirect_url.trim().to_string(),
            kyc_level,
            bank_accounts_requested: input.bank_accounts,
            encrypted_data,
            allow_url,
            kyc_token,
            token_expires_at: now + TOKEN_TTL,
            status: RequestStatus::Initiated,
            created_at: now,
            updated_at: now,
        };

        let inserted = self.db.insert_request_with_customer(&request, draft.new_rows());
        let customer = match inserted {
            Ok(Some(stored)) => {
                tracing::debug!(customer_id = %stored.id, "Lost customer creation race, using stored customer");
                stored
            }
            Ok(None) => {
                if draft.new_rows().is_some() {
                    tracing::info!(customer_id = %draft.customer().id, "Created customer");
                }
                draft.into_customer()
            }
            Err(DbError::Conflict(UniqueKey::RequestReference)) => {
                return Err(KycError::DuplicateReference(request.reference));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            request_id = %request.id,
            application_id = %application.id,
            customer_id = %customer.id,
            kyc_level = kyc_level.as_str(),
            "KYC request initiated"
        );

        Ok(CreatedKycRequest { request, customer })
    }

    /// Resolve a request and its customer from the request token.
    ///
    /// Terminal requests are refused before anything is decrypted.
    pub fn fetch(&self, kyc_token: &str) -> Result<FetchedKycRequest, KycError> {
        let request = self
            .db
            .find_request_by_token(kyc_token)?
            .ok_or(KycError::NotFound("KYC request"))?;

        if let Some(guard) = KycError::terminal(request.status) {
            tracing::info!(request_id = %request.id, status = %request.status, "Refused fetch of terminal request");
            return Err(guard);
        }
        if self.settings.enforce_token_expiry && request.is_token_expired(Utc::now()) {
            return Err(KycError::TokenExpired);
        }

        let plaintext = self.envelope.decrypt(&request.encrypted_data)?;
        let sealed: SealedCustomer = serde_json::from_slice(&plaintext)?;

        let customer = self
            .customers
            .find_by_email(&sealed.email)?
            .ok_or(KycError::NotFound("customer"))?;
        let identities = self.customers.identities(&customer.id)?;

        Ok(FetchedKycRequest {
            request,
            customer,
            identities,
        })
    }

    /// Move a request forward in its lifecycle.
    ///
    /// Terminal requests reject every transition; backward or repeated
    /// states are validation errors.
    pub fn advance_status(
        &self,
        request_id: &str,
        next: RequestStatus,
    ) -> Result<KycRequest, KycError> {
        let result = self.db.update_request(request_id, |request| {
            if let Some(guard) = KycError::terminal(request.status) {
                return Err(guard);
            }
            if !request.status.can_transition_to(next) {
                return Err(KycError::validation(format!(
                    "cannot move KYC request from {} to {next}",
                    request.status
                )));
            }
            request.status = next;
            Ok(())
        });

        match result {
            Ok(request) => {
                tracing::info!(request_id = %request.id, status = %request.status, "KYC request status advanced");
                Ok(request)
            }
            Err(KycError::Storage(DbError::NotFound(_))) => Err(KycError::NotFound("KYC request")),
            Err(e) => Err(e),
        }
    }
}

/// Field-level checks on the create input; returns the requested tier.
fn validate(input: &KycRequestInput) -> Result<KycLevel, KycError> {
    let customer = &input.customer;
    let required = [
        ("customer name", customer.name.as_str()),
        ("customer email", customer.email.as_str()),
        ("customer address", customer.address.as_str()),
        ("identity number", customer.identity.number.as_str()),
        ("redirect_url", input.redirect_url.as_str()),
        ("kyc_level", input.kyc_level.as_str()),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(KycError::validation(format!("{field} is required")));
    }

    if IdentityType::parse(&customer.identity.identity_type).is_none() {
        return Err(KycError::validation("identity type must be BVN or NIN"));
    }
    let kyc_level = KycLevel::parse_requested(&input.kyc_level)
        .ok_or_else(|| KycError::validation("kyc_level must be tier_1, tier_2 or tier_3"))?;
    Url::parse(input.redirect_url.trim())
        .map_err(|_| KycError::validation("redirect_url must be an absolute URL"))?;

    Ok(kyc_level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::KEY_LEN;
    use crate::models::{AppMode, AppStatus, CustomerInput, IdentityInput};

    struct Fixture {
        ledger: KycLedger,
        db: Arc<KycDatabase>,
        _dir: tempfile::TempDir,
    }

    fn fixture(enforce_token_expiry: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(KycDatabase::open(&dir.path().join("test.redb")).unwrap());
        let envelope = Arc::new(CryptoEnvelope::new(&[3u8; KEY_LEN]).unwrap());
        let customers = Arc::new(CustomerRegistry::new(db.clone(), envelope.clone()));
        let settings = LedgerSettings {
            allow_url_base: Url::parse(DEFAULT_ALLOW_URL_BASE).unwrap(),
            enforce_token_expiry,
        };
        Fixture {
            ledger: KycLedger::new(db.clone(), envelope, customers, settings),
            db,
            _dir: dir,
        }
    }

    fn application() -> Application {
        let now = Utc::now();
        Application {
            id: "app-1".to_string(),
            company_id: "company-1".to_string(),
            name: "app".to_string(),
            display_name: "App".to_string(),
            test_public_key: "pk_test_1".to_string(),
            live_public_key: "pk_live_1".to_string(),
            mode: AppMode::Sandbox,
            status: AppStatus::Active,
            webhook_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn input(reference: &str, email: &str) -> KycRequestInput {
        KycRequestInput {
            customer: CustomerInput {
                name: "John Doe".to_string(),
                email: email.to_string(),
                address: "1 Main St".to_string(),
                identity: IdentityInput {
                    identity_type: "BVN".to_string(),
                    number: "12345678901".to_string(),
                },
            },
            reference: reference.to_string(),
            redirect_url: "https://r".to_string(),
            kyc_level: "tier_1".to_string(),
            bank_accounts: true,
        }
    }

    #[test]
    fn end_to_end_create_and_resubmit() {
        let f = fixture(false);
        let app = application();

        let first = f.ledger.create(&app, &input("ref-1", "john@x.com")).unwrap();
        assert_eq!(first.request.reference, "ref-1");
        assert!(!first.request.kyc_token.is_empty());
        assert!(first.request.bank_accounts_requested);
        assert_eq!(first.request.status, RequestStatus::Initiated);
        assert_eq!(first.request.company_id, "company-1");
        assert_eq!(
            first.request.allow_url,
            format!("{DEFAULT_ALLOW_URL_BASE}{}", first.request.kyc_token)
        );
        assert_eq!(
            first.request.token_expires_at - first.request.created_at,
            TOKEN_TTL
        );

        let second = f.ledger.create(&app, &input("ref-2", "John@X.com")).unwrap();
        assert_eq!(second.customer.token, first.customer.token);
        assert_ne!(second.request.kyc_token, first.request.kyc_token);
        assert_eq!(f.db.count_customers().unwrap(), 1);
    }

    #[test]
    fn pii_is_sealed_at_rest() {
        let f = fixture(false);
        let created = f.ledger.create(&application(), &input("ref-1", "john@x.com")).unwrap();
        let stored = f.db.get_request(&created.request.id).unwrap().unwrap();
        assert!(!stored.encrypted_data.contains("John"));
        assert!(!stored.encrypted_data.contains("12345678901"));
        assert!(stored.encrypted_data.contains(':'));
    }

    #[test]
    fn duplicate_reference_is_rejected() {
        let f = fixture(false);
        let app = application();
        f.ledger.create(&app, &input("ref-1", "a@x.com")).unwrap();
        assert!(matches!(
            f.ledger.create(&app, &input("ref-1", "b@x.com")),
            Err(KycError::DuplicateReference(r)) if r == "ref-1"
        ));
    }

    #[test]
    fn concurrent_duplicate_reference_has_one_winner() {
        let f = fixture(false);
        let app = application();
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = ["a@x.com", "b@x.com"]
                .into_iter()
                .map(|email| {
                    let ledger = &f.ledger;
                    let app = &app;
                    s.spawn(move || ledger.create(app, &input("ref-1", email)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(KycError::DuplicateReference(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(f.db.count_by_reference("ref-1").unwrap(), 1);
    }

    #[test]
    fn rejected_duplicates_leave_no_customer_behind() {
        let f = fixture(false);
        let app = application();
        let mut successes = 0;

        for round in 0..25 {
            let reference = format!("ref-{round}");
            let barrier = std::sync::Barrier::new(2);
            let results: Vec<_> = std::thread::scope(|s| {
                let handles: Vec<_> = ["a", "b"]
                    .into_iter()
                    .map(|who| {
                        let (ledger, app, barrier) = (&f.ledger, &app, &barrier);
                        let body = input(&reference, &format!("{who}-{round}@x.com"));
                        s.spawn(move || {
                            barrier.wait();
                            ledger.create(app, &body)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert!(results.iter().all(|r| r.is_ok()
                || matches!(r, Err(KycError::DuplicateReference(_)))));
            successes += results.iter().filter(|r| r.is_ok()).count() as u64;
        }

        assert_eq!(successes, 25);
        assert_eq!(f.db.count_customers().unwrap(), successes);
    }

    #[test]
    fn duplicate_reference_does_not_register_customer() {
        let f = fixture(false);
        let app = application();
        f.ledger.create(&app, &input("ref-1", "a@x.com")).unwrap();
        assert!(f.ledger.create(&app, &input("ref-1", "b@x.com")).is_err());
        assert!(f.ledger.customers.find_by_email("b@x.com").unwrap().is_none());
        assert_eq!(f.db.count_customers().unwrap(), 1);
    }

    #[test]
    fn validation_errors() {
        let f = fixture(false);
        let app = application();

        let cases: [fn(&mut KycRequestInput); 8] = [
            |i| i.reference = "  ".to_string(),
            |i| i.customer.identity.identity_type = "passport".to_string(),
            |i| i.customer.name.clear(),
            |i| i.customer.address = " ".to_string(),
            |i| i.customer.identity.number.clear(),
            |i| i.redirect_url = "not a url".to_string(),
            |i| i.kyc_level = "tier_9".to_string(),
            |i| i.kyc_level = "none".to_string(),
        ];
        for mutate in cases {
            let mut bad = input("ref-v", "v@x.com");
            mutate(&mut bad);
            assert!(matches!(
                f.ledger.create(&app, &bad),
                Err(KycError::Validation(_))
            ));
        }
        assert_eq!(f.db.count_customers().unwrap(), 0);
    }

    #[test]
    fn identity_type_is_case_insensitive() {
        let f = fixture(false);
        let mut lower = input("ref-1", "n@x.com");
        lower.customer.identity.identity_type = "nin".to_string();
        assert!(f.ledger.create(&application(), &lower).is_ok());
    }

    #[test]
    fn fetch_returns_request_and_customer() {
        let f = fixture(false);
        let created = f.ledger.create(&application(), &input("ref-1", "john@x.com")).unwrap();

        let fetched = f.ledger.fetch(&created.request.kyc_token).unwrap();
        assert_eq!(fetched.request.id, created.request.id);
        assert_eq!(fetched.customer.id, created.customer.id);
        assert_eq!(fetched.identities.len(), 1);

        let response = fetched.to_response();
        assert_eq!(response.redirect_url, "https://r");
        assert_eq!(response.kyc_level, KycLevel::Tier1);
        assert!(response.bank_accounts_requested);
        assert_eq!(response.status, RequestStatus::Initiated);
        assert_eq!(response.customer.token, created.customer.token);
    }

    #[test]
    fn fetch_unknown_token_is_not_found() {
        let f = fixture(false);
        assert!(matches!(
            f.ledger.fetch("deadbeef"),
            Err(KycError::NotFound(_))
        ));
    }

    #[test]
    fn terminal_requests_are_not_fetchable() {
        let f = fixture(false);
        let app = application();
        let done = f.ledger.create(&app, &input("ref-1", "a@x.com")).unwrap();
        let failed = f.ledger.create(&app, &input("ref-2", "b@x.com")).unwrap();

        for step in [
            RequestStatus::OtpPending,
            RequestStatus::KycProcessing,
            RequestStatus::Completed,
        ] {
            f.ledger.advance_status(&done.request.id, step).unwrap();
        }
        f.ledger
            .advance_status(&failed.request.id, RequestStatus::Failed)
            .unwrap();

        assert!(matches!(
            f.ledger.fetch(&done.request.kyc_token),
            Err(KycError::AlreadyCompleted)
        ));
        assert!(matches!(
            f.ledger.fetch(&failed.request.kyc_token),
            Err(KycError::RequestFailed)
        ));
    }

    #[test]
    fn status_only_moves_forward() {
        let f = fixture(false);
        let created = f.ledger.create(&application(), &input("ref-1", "a@x.com")).unwrap();
        let id = &created.request.id;

        // Steps cannot be skipped
        assert!(matches!(
            f.ledger.advance_status(id, RequestStatus::Completed),
            Err(KycError::Validation(_))
        ));
        f.ledger.advance_status(id, RequestStatus::OtpPending).unwrap();
        f.ledger.advance_status(id, RequestStatus::KycProcessing).unwrap();
        assert!(matches!(
            f.ledger.advance_status(id, RequestStatus::OtpPending),
            Err(KycError::Validation(_))
        ));
        assert_eq!(
            f.db.get_request(id).unwrap().unwrap().status,
            RequestStatus::KycProcessing
        );
        f.ledger.advance_status(id, RequestStatus::Failed).unwrap();
        assert!(matches!(
            f.ledger.advance_status(id, RequestStatus::Completed),
            Err(KycError::RequestFailed)
        ));
        assert!(matches!(
            f.ledger.advance_status("missing", RequestStatus::Completed),
            Err(KycError::NotFound(_))
        ));
    }

    #[test]
    fn expiry_enforced_only_when_configured() {
        let f = fixture(true);
        let created = f.ledger.create(&application(), &input("ref-1", "a@x.com")).unwrap();
        assert!(f.ledger.fetch(&created.request.kyc_token).is_ok());

        let past = created.request.token_expires_at + Duration::seconds(1);
        assert!(created.request.is_token_expired(past));
        assert!(!created.request.is_token_expired(created.request.created_at));

        // Age the stored token by rewriting its expiry
        f.db.update_request::<KycError, _>(&created.request.id, |r| {
            r.token_expires_at = Utc::now() - Duration::minutes(1);
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            f.ledger.fetch(&created.request.kyc_token),
            Err(KycError::TokenExpired)
        ));

        let lenient = fixture(false);
        let created = lenient.ledger.create(&application(), &input("ref-1", "a@x.com")).unwrap();
        lenient
            .db
            .update_request::<KycError, _>(&created.request.id, |r| {
                r.token_expires_at = Utc::now() - Duration::minutes(1);
                Ok(())
            })
            .unwrap();
        assert!(lenient.ledger.fetch(&created.request.kyc_token).is_ok());
    }
}
