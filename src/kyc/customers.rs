// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Customer registry: find-or-create keyed by the normalized email hash.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::KycError;
use crate::crypto::{generate_hex_token, hash_email, normalize_email, CryptoEnvelope};
use crate::models::{
    Customer, CustomerStatus, Identity, IdentityInput, IdentityStatus, IdentityType, KycLevel,
};
use crate::storage::{DbError, KycDatabase, UniqueKey};

/// Outcome of resolving an email before anything is written.
#[derive(Debug, Clone)]
pub enum CustomerDraft {
    /// A customer already owns the email.
    Existing(Customer),
    /// Rows to insert; nothing is stored yet.
    New { customer: Customer, identity: Identity },
}

impl CustomerDraft {
    pub fn customer(&self) -> &Customer {
        match self {
            CustomerDraft::Existing(customer) | CustomerDraft::New { customer, .. } => customer,
        }
    }

    /// The rows to insert, if the customer is new.
    pub fn new_rows(&self) -> Option<(&Customer, &Identity)> {
        match self {
            CustomerDraft::Existing(_) => None,
            CustomerDraft::New { customer, identity } => Some((customer, identity)),
        }
    }

    pub fn into_customer(self) -> Customer {
        match self {
            CustomerDraft::Existing(customer) | CustomerDraft::New { customer, .. } => customer,
        }
    }
}

pub struct CustomerRegistry {
    db: Arc<KycDatabase>,
    envelope: Arc<CryptoEnvelope>,
}

impl CustomerRegistry {
    pub fn new(db: Arc<KycDatabase>, envelope: Arc<CryptoEnvelope>) -> Self {
        Self { db, envelope }
    }

    /// Customer owning `email`, if one exists.
    pub fn find_by_email(&self, email: &str) -> Result<Option<Customer>, KycError> {
        self.find_by_email_hash(&hash_email(email))
    }

    pub fn find_by_email_hash(&self, email_hash: &str) -> Result<Option<Customer>, KycError> {
        Ok(self.db.find_customer_by_email_hash(email_hash)?)
    }

    /// Look up the customer for `email`, or build (but do not store) a new
    /// one with its encrypted identity.
    ///
    /// The identity input is only validated when the customer is new.
    pub fn prepare(&self, email: &str, identity: &IdentityInput) -> Result<CustomerDraft, KycError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(KycError::validation("customer email is required"));
        }
        let email_hash = hash_email(&email);

        if let Some(existing) = self.find_by_email_hash(&email_hash)? {
            tracing::debug!(customer_id = %existing.id, "Matched existing customer");
            return Ok(CustomerDraft::Existing(existing));
        }

        let identity_type = IdentityType::parse(&identity.identity_type)
            .ok_or_else(|| KycError::validation("identity type must be BVN or NIN"))?;
        let number = identity.number.trim();
        if number.is_empty() {
            return Err(KycError::validation("identity number is required"));
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().simple().to_string(),
            token: generate_hex_token()?,
            email,
            email_hash,
            status: CustomerStatus::Pending,
            kyc_level_achieved: KycLevel::None,
            is_blacklisted: false,
            created_at: now,
            updated_at: now,
        };
        let identity = Identity {
            id: Uuid::new_v4().simple().to_string(),
            customer_id: customer.id.clone(),
            identity_type,
            value_encrypted: self.envelope.encrypt_str(number)?,
            status: IdentityStatus::Pending,
            verified: false,
            created_at: now,
        };
        Ok(CustomerDraft::New { customer, identity })
    }

    /// Return the customer for `email`, creating it (with one identity) if absent.
    ///
    /// The identity input is ignored when the customer already exists. Two
    /// concurrent first-time calls for the same email both end up with the
    /// single stored customer: the storage layer rejects the second insert
    /// and the loser re-reads the winner's row.
    pub fn find_or_create(
        &self,
        email: &str,
        identity: &IdentityInput,
    ) -> Result<Customer, KycError> {
        let (customer, identity) = match self.prepare(email, identity)? {
            CustomerDraft::Existing(customer) => return Ok(customer),
            CustomerDraft::New { customer, identity } => (customer, identity),
        };

        match self.db.insert_customer(&customer, &identity) {
            Ok(()) => {
                tracing::info!(customer_id = %customer.id, "Created customer");
                Ok(customer)
            }
            Err(DbError::Conflict(UniqueKey::CustomerEmailHash)) => {
                tracing::debug!("Lost customer creation race, using stored customer");
                self.find_by_email_hash(&customer.email_hash)?
                    .ok_or(KycError::DuplicateCustomer)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Identity documents owned by `customer_id`.
    pub fn identities(&self, customer_id: &str) -> Result<Vec<Identity>, KycError> {
        Ok(self.db.list_identities(customer_id)?)
    }
}
