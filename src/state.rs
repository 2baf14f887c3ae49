// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::webhook::WebhookNotifier;
use crate::auth::AuthGate;
use crate::crypto::{CryptoEnvelope, SecretDeriver};
use crate::kyc::{ApplicationService, CustomerRegistry, KycLedger, LedgerSettings};
use crate::storage::{CredentialStore, KycDatabase};

/// Shared handles for request handlers. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<KycDatabase>,
    pub credentials: Arc<CredentialStore>,
    pub deriver: Arc<SecretDeriver>,
    pub auth: Arc<AuthGate>,
    pub customers: Arc<CustomerRegistry>,
    pub ledger: Arc<KycLedger>,
    pub applications: Arc<ApplicationService>,
    pub webhooks: WebhookNotifier,
}

impl AppState {
    /// Wire every service around one database and one set of keys.
    pub fn new(
        db: Arc<KycDatabase>,
        envelope: CryptoEnvelope,
        deriver: SecretDeriver,
        settings: LedgerSettings,
        credential_cache_capacity: usize,
        webhooks: WebhookNotifier,
    ) -> Self {
        let envelope = Arc::new(envelope);
        let deriver = Arc::new(deriver);
        let credentials = Arc::new(CredentialStore::new(db.clone(), credential_cache_capacity));
        let customers = Arc::new(CustomerRegistry::new(db.clone(), envelope.clone()));

        Self {
            auth: Arc::new(AuthGate::new(credentials.clone(), db.clone())),
            ledger: Arc::new(KycLedger::new(
                db.clone(),
                envelope,
                customers.clone(),
                settings,
            )),
            applications: Arc::new(ApplicationService::new(
                db.clone(),
                credentials.clone(),
                deriver.clone(),
            )),
            customers,
            credentials,
            deriver,
            db,
            webhooks,
        }
    }
}
