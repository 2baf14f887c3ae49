// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startup: open storage, build services, heal the credential index and
//! run optional seeding.

use std::sync::Arc;

use crate::api::webhook::WebhookNotifier;
use crate::config::{AppConfig, SeedConfig};
use crate::crypto::{CryptoEnvelope, CryptoError, SecretDeriver};
use crate::kyc::{KycError, LedgerSettings, NewApplication, ProvisionedApplication};
use crate::models::AppMode;
use crate::state::AppState;
use crate::storage::{DbError, KycDatabase, DATABASE_FILE};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid key material: {0}")]
    Crypto(#[from] CryptoError),

    #[error("failed to open database: {0}")]
    Database(#[from] DbError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("seeding failed: {0}")]
    Seed(#[from] KycError),
}

/// Build the application state from validated configuration.
pub fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let envelope = CryptoEnvelope::new(&config.encryption_key)?;
    let deriver = SecretDeriver::new(&config.secret_salt)?;

    let db_path = config.data_dir.join(DATABASE_FILE);
    let db = Arc::new(KycDatabase::open(&db_path)?);
    tracing::info!(path = %db_path.display(), "Opened database");

    let settings = LedgerSettings {
        allow_url_base: config.allow_url_base.clone(),
        enforce_token_expiry: config.enforce_token_expiry,
    };
    let state = AppState::new(
        db,
        envelope,
        deriver,
        settings,
        config.credential_cache_capacity,
        WebhookNotifier::new()?,
    );

    let registered = state.credentials.rebuild(&state.deriver)?;
    tracing::info!(secrets = registered, "Rebuilt credential index");

    Ok(state)
}

/// Provision the seed company and application unless the company exists.
///
/// Returns the new application with its secrets, or `None` if already seeded.
pub fn seed(
    state: &AppState,
    seed: &SeedConfig,
) -> Result<Option<ProvisionedApplication>, StartupError> {
    if state
        .applications
        .find_company_by_email(&seed.company_email)?
        .is_some()
    {
        tracing::debug!("Seed company already present");
        return Ok(None);
    }

    let company = state
        .applications
        .create_company(&seed.company_name, &seed.company_email, None)?;
    let provisioned = state.applications.provision(NewApplication {
        company_id: company.id,
        name: seed.app_name.clone(),
        display_name: seed.app_name.clone(),
        mode: AppMode::Sandbox,
        webhook_url: None,
    })?;
    Ok(Some(provisioned))
}
