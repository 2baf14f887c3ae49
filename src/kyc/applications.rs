// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Company and application provisioning.
//!
//! Provisioning is the only place secrets are produced in the clear. They
//! are handed back once and registered in the [`CredentialStore`]; only
//! their public identifiers are persisted.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::KycError;
use crate::crypto::{normalize_email, KeyEnvironment, SecretDeriver};
use crate::models::{AppMode, AppStatus, Application, Company};
use crate::storage::{CredentialStore, DbError, KycDatabase, UniqueKey};

/// Parameters for a new application.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub company_id: String,
    pub name: String,
    pub display_name: String,
    pub mode: AppMode,
    pub webhook_url: Option<String>,
}

/// A freshly provisioned application and its two secret keys.
pub struct ProvisionedApplication {
    pub application: Application,
    pub test_secret_key: String,
    pub live_secret_key: String,
}

impl std::fmt::Debug for ProvisionedApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedApplication")
            .field("application", &self.application)
            .field("test_secret_key", &"<redacted>")
            .field("live_secret_key", &"<redacted>")
            .finish()
    }
}

pub struct ApplicationService {
    db: Arc<KycDatabase>,
    credentials: Arc<CredentialStore>,
    deriver: Arc<SecretDeriver>,
}

impl ApplicationService {
    pub fn new(
        db: Arc<KycDatabase>,
        credentials: Arc<CredentialStore>,
        deriver: Arc<SecretDeriver>,
    ) -> Self {
        Self {
            db,
            credentials,
            deriver,
        }
    }

    pub fn create_company(
        &self,
        name: &str,
        email: &str,
        webhook_url: Option<String>,
    ) -> Result<Company, KycError> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() {
            return Err(KycError::validation("company name and email are required"));
        }

        let company = Company {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            email,
            webhook_url,
            created_at: Utc::now(),
        };
        match self.db.insert_company(&company) {
            Ok(()) => {}
            Err(DbError::Conflict(UniqueKey::CompanyEmail)) => return Err(KycError::DuplicateCompany),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(company_id = %company.id, "Created company");
        Ok(company)
    }

    pub fn find_company_by_email(&self, email: &str) -> Result<Option<Company>, KycError> {
        Ok(self.db.find_company_by_email(&normalize_email(email))?)
    }

    /// Create an application, derive its secrets and register them.
    pub fn provision(&self, params: NewApplication) -> Result<ProvisionedApplication, KycError> {
        if params.name.trim().is_empty() {
            return Err(KycError::validation("application name is required"));
        }
        if self.db.get_company(&params.company_id)?.is_none() {
            return Err(KycError::NotFound("company"));
        }

        let now = Utc::now();
        let display_name = if params.display_name.trim().is_empty() {
            params.name.clone()
        } else {
            params.display_name
        };
        let application = Application {
            id: Uuid::new_v4().simple().to_string(),
            company_id: params.company_id,
            name: params.name,
            display_name,
            test_public_key: SecretDeriver::generate_public_identifier(KeyEnvironment::Test)?,
            live_public_key: SecretDeriver::generate_public_identifier(KeyEnvironment::Live)?,
            mode: params.mode,
            status: AppStatus::Active,
            webhook_url: params.webhook_url,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_application(&application)?;

        let test_secret_key = self
            .deriver
            .derive(&application.test_public_key, KeyEnvironment::Test);
        let live_secret_key = self
            .deriver
            .derive(&application.live_public_key, KeyEnvironment::Live);
        self.credentials.put(&test_secret_key, &application.id)?;
        self.credentials.put(&live_secret_key, &application.id)?;

        tracing::info!(
            application_id = %application.id,
            company_id = %application.company_id,
            "Provisioned application"
        );

        Ok(ProvisionedApplication {
            application,
            test_secret_key,
            live_secret_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (ApplicationService, Arc<CredentialStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(KycDatabase::open(&dir.path().join("test.redb")).unwrap());
        let credentials = Arc::new(CredentialStore::new(db.clone(), 16));
        let deriver = Arc::new(SecretDeriver::new(b"applications-test-salt").unwrap());
        (
            ApplicationService::new(db, credentials.clone(), deriver),
            credentials,
            dir,
        )
    }

    fn new_app(company_id: &str) -> NewApplication {
        NewApplication {
            company_id: company_id.to_string(),
            name: "checkout".to_string(),
            display_name: String::new(),
            mode: AppMode::Sandbox,
            webhook_url: None,
        }
    }

    #[test]
    fn provisioned_secrets_resolve_to_the_application() {
        let (service, credentials, _dir) = service();
        let company = service.create_company("Acme", "Ops@Acme.test", None).unwrap();
        assert_eq!(company.email, "ops@acme.test");

        let provisioned = service.provision(new_app(&company.id)).unwrap();
        let app = &provisioned.application;
        assert!(app.test_public_key.starts_with("pk_test_"));
        assert!(app.live_public_key.starts_with("pk_live_"));
        assert_eq!(app.display_name, "checkout");
        assert!(provisioned.test_secret_key.starts_with("sk_test_"));
        assert!(provisioned.live_secret_key.starts_with("sk_live_"));

        for secret in [&provisioned.test_secret_key, &provisioned.live_secret_key] {
            assert_eq!(credentials.resolve(secret).unwrap(), Some(app.id.clone()));
        }

        let rendered = format!("{provisioned:?}");
        assert!(!rendered.contains(&provisioned.live_secret_key));
    }

    #[test]
    fn company_email_is_unique_case_insensitively() {
        let (service, _, _dir) = service();
        service.create_company("Acme", "ops@acme.test", None).unwrap();
        assert!(matches!(
            service.create_company("Acme 2", " OPS@acme.test", None),
            Err(KycError::DuplicateCompany)
        ));
        assert!(service.find_company_by_email("OPS@ACME.TEST").unwrap().is_some());
    }

    #[test]
    fn provision_requires_existing_company() {
        let (service, _, _dir) = service();
        assert!(matches!(
            service.provision(new_app("missing")),
            Err(KycError::NotFound("company"))
        ));
    }
}
