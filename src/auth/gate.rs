// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential check at the request boundary.
//!
//! A presented secret key is resolved through the [`CredentialStore`] to an
//! application id, then to the live application and its owning company.
//! Nothing is mutated.

use std::sync::Arc;

use super::AuthError;
use crate::crypto::{mask_secret, KeyEnvironment};
use crate::models::{Application, Company};
use crate::storage::{CredentialStore, KycDatabase};

/// The application (and company) a request is acting for.
#[derive(Debug, Clone)]
pub struct ResolvedApplication {
    pub application: Application,
    pub company: Company,
}

pub struct AuthGate {
    credentials: Arc<CredentialStore>,
    db: Arc<KycDatabase>,
}

impl AuthGate {
    pub fn new(credentials: Arc<CredentialStore>, db: Arc<KycDatabase>) -> Self {
        Self { credentials, db }
    }

    /// Authenticate a raw credential header value.
    pub fn authenticate(&self, header: Option<&str>) -> Result<ResolvedApplication, AuthError> {
        let secret = header
            .and_then(first_credential)
            .ok_or(AuthError::Unauthenticated)?;

        // Only `sk_test_` / `sk_live_` keys are ever issued
        let environment = KeyEnvironment::of_secret(secret).ok_or_else(|| {
            tracing::info!(credential = %mask_secret(secret), "Rejected API key with unknown prefix");
            AuthError::Unauthorized
        })?;

        let app_id = self
            .credentials
            .resolve(secret)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or_else(|| {
                tracing::info!(credential = %mask_secret(secret), "Rejected unknown API key");
                AuthError::Unauthorized
            })?;

        let application = self
            .db
            .get_application(&app_id)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .filter(Application::is_active)
            .ok_or_else(|| {
                tracing::info!(application_id = %app_id, "API key resolved to missing or inactive application");
                AuthError::ApplicationNotFound
            })?;

        let company = self
            .db
            .get_company(&application.company_id)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or_else(|| {
                tracing::info!(application_id = %app_id, "Application has no owning company");
                AuthError::ApplicationNotFound
            })?;

        tracing::debug!(
            application_id = %application.id,
            company_id = %company.id,
            environment = ?environment,
            "Authenticated application"
        );

        Ok(ResolvedApplication {
            application,
            company,
        })
    }
}

/// First non-empty credential of a possibly comma-separated header value.
fn first_credential(header: &str) -> Option<&str> {
    let mut values = header.split(',').map(str::trim);
    let first = values.next().filter(|v| !v.is_empty())?;
    if values.any(|v| !v.is_empty()) {
        tracing::warn!(
            credential = %mask_secret(first),
            "Multiple API keys presented, using the first"
        );
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretDeriver;
    use crate::kyc::{ApplicationService, NewApplication};
    use crate::models::{AppMode, AppStatus};

    struct Fixture {
        gate: AuthGate,
        db: Arc<KycDatabase>,
        credentials: Arc<CredentialStore>,
        applications: ApplicationService,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(KycDatabase::open(&dir.path().join("test.redb")).unwrap());
        let credentials = Arc::new(CredentialStore::new(db.clone(), 16));
        let deriver = Arc::new(SecretDeriver::new(b"auth-gate-test-salt!").unwrap());
        Fixture {
            gate: AuthGate::new(credentials.clone(), db.clone()),
            applications: ApplicationService::new(db.clone(), credentials.clone(), deriver),
            db,
            credentials,
            _dir: dir,
        }
    }

    fn provision(f: &Fixture) -> (Application, String) {
        let company = f.applications.create_company("Acme", "ops@acme.test", None).unwrap();
        let provisioned = f
            .applications
            .provision(NewApplication {
                company_id: company.id,
                name: "checkout".to_string(),
                display_name: "Checkout".to_string(),
                mode: AppMode::Live,
                webhook_url: None,
            })
            .unwrap();
        (provisioned.application, provisioned.live_secret_key)
    }

    #[test]
    fn missing_or_empty_header_is_unauthenticated() {
        let f = fixture();
        for header in [None, Some(""), Some("   "), Some(" , sk_test_x")] {
            assert!(matches!(
                f.gate.authenticate(header),
                Err(AuthError::Unauthenticated)
            ));
        }
    }

    #[test]
    fn unknown_secret_is_unauthorized() {
        let f = fixture();
        provision(&f);
        assert!(matches!(
            f.gate.authenticate(Some("sk_live_deadbeef")),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn untagged_secret_is_unauthorized_even_if_stored() {
        let f = fixture();
        let (app, _) = provision(&f);
        f.credentials.put("pk_live_not_a_secret", &app.id).unwrap();
        for presented in ["pk_live_not_a_secret", "sk_testing", "sk_live"] {
            assert!(matches!(
                f.gate.authenticate(Some(presented)),
                Err(AuthError::Unauthorized)
            ));
        }
    }

    #[test]
    fn valid_secret_resolves_application_and_company() {
        let f = fixture();
        let (app, secret) = provision(&f);
        let resolved = f.gate.authenticate(Some(&secret)).unwrap();
        assert_eq!(resolved.application.id, app.id);
        assert_eq!(resolved.company.id, app.company_id);
    }

    #[test]
    fn first_of_multiple_credentials_is_used() {
        let f = fixture();
        let (app, secret) = provision(&f);
        let header = format!("{secret}, sk_live_other");
        assert_eq!(
            f.gate.authenticate(Some(&header)).unwrap().application.id,
            app.id
        );
        assert!(matches!(
            f.gate.authenticate(Some(&format!("sk_live_other,{secret}"))),
            Err(AuthError::Unauthorized)
        ));
    }

    #[test]
    fn dangling_credential_is_application_not_found() {
        let f = fixture();
        let secret = SecretDeriver::new(b"auth-gate-test-salt!")
            .unwrap()
            .derive("pk_live_ghost", KeyEnvironment::Live);
        f.credentials.put(&secret, "ghost-app").unwrap();
        assert!(matches!(
            f.gate.authenticate(Some(&secret)),
            Err(AuthError::ApplicationNotFound)
        ));
    }

    #[test]
    fn inactive_application_is_not_found() {
        let f = fixture();
        let (mut app, secret) = provision(&f);

        // Point the same secret at an inactive copy
        app.status = AppStatus::Inactive;
        app.id = "inactive-app".to_string();
        f.db.insert_application(&app).unwrap();
        f.credentials.put(&secret, &app.id).unwrap();

        assert!(matches!(
            f.gate.authenticate(Some(&secret)),
            Err(AuthError::ApplicationNotFound)
        ));
    }
}
