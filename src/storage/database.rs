// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded KYC database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `companies`: company id → serialized Company
//! - `company_email_index`: lowercase email → company id (unique)
//! - `applications`: application id → serialized Application
//! - `credential_index`: sha256(secret) → application id
//! - `customers`: customer id → serialized Customer
//! - `customer_email_index`: email hash → customer id (unique)
//! - `customer_token_index`: customer token → customer id (unique)
//! - `identities`: `customer_id|identity_id` → serialized Identity
//! - `kyc_requests`: request id → serialized KycRequest
//! - `request_reference_index`: reference → request id (unique)
//! - `request_token_index`: kyc token → request id (unique)
//!
//! ## Uniqueness
//!
//! redb admits a single write transaction at a time, so every unique index is
//! checked and written inside the same write transaction as the row it
//! guards. A losing writer gets [`DbError::Conflict`] and its transaction is
//! aborted; nothing it wrote becomes visible.

use std::path::Path;

use chrono::Utc;
use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{Application, Company, Customer, Identity, KycRequest};

// =============================================================================
// Table Definitions
// =============================================================================

const COMPANIES: TableDefinition<&str, &[u8]> = TableDefinition::new("companies");
const COMPANY_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("company_email_index");

const APPLICATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("applications");

/// sha256(secret) hex → application id. The raw secret is never stored.
const CREDENTIAL_INDEX: TableDefinition<&str, &str> = TableDefinition::new("credential_index");

const CUSTOMERS: TableDefinition<&str, &[u8]> = TableDefinition::new("customers");
const CUSTOMER_EMAIL_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("customer_email_index");
const CUSTOMER_TOKEN_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("customer_token_index");

/// Key format: `customer_id|identity_id` so a prefix scan lists one customer.
const IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");

const KYC_REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("kyc_requests");
const REQUEST_REFERENCE_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("request_reference_index");
const REQUEST_TOKEN_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("request_token_index");

// =============================================================================
// Error Type
// =============================================================================

/// Unique constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    CompanyId,
    CompanyEmail,
    ApplicationId,
    CustomerEmailHash,
    CustomerToken,
    RequestReference,
    RequestToken,
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UniqueKey::CompanyId => "company id",
            UniqueKey::CompanyEmail => "company email",
            UniqueKey::ApplicationId => "application id",
            UniqueKey::CustomerEmailHash => "customer email hash",
            UniqueKey::CustomerToken => "customer token",
            UniqueKey::RequestReference => "request reference",
            UniqueKey::RequestToken => "request token",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    Conflict(UniqueKey),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Helpers
// =============================================================================

fn identity_key(customer_id: &str, identity_id: &str) -> String {
    format!("{customer_id}|{identity_id}")
}

/// Half-open range covering every identity key of one customer.
fn identity_range(customer_id: &str) -> (String, String) {
    // '}' is the byte after '|'
    (format!("{customer_id}|"), format!("{customer_id}}}"))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

// =============================================================================
// KycDatabase
// =============================================================================

/// Relational store for companies, applications, customers and KYC requests.
pub struct KycDatabase {
    db: Database,
}

impl KycDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(COMPANIES)?;
            let _ = write_txn.open_table(COMPANY_EMAIL_INDEX)?;
            let _ = write_txn.open_table(APPLICATIONS)?;
            let _ = write_txn.open_table(CREDENTIAL_INDEX)?;
            let _ = write_txn.open_table(CUSTOMERS)?;
            let _ = write_txn.open_table(CUSTOMER_EMAIL_INDEX)?;
            let _ = write_txn.open_table(CUSTOMER_TOKEN_INDEX)?;
            let _ = write_txn.open_table(IDENTITIES)?;
            let _ = write_txn.open_table(KYC_REQUESTS)?;
            let _ = write_txn.open_table(REQUEST_REFERENCE_INDEX)?;
            let _ = write_txn.open_table(REQUEST_TOKEN_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `f` in a write transaction; commit on `Ok`, abort on `Err`.
    fn write<T, E>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let txn = self.db.begin_write().map_err(DbError::from)?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(DbError::from)?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(DbError::from)?;
                Err(e)
            }
        }
    }

    /// Point lookup of a JSON row.
    fn get_row<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> DbResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        match table.get(key)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve an index entry, then load the row it points to.
    fn get_indexed<T: DeserializeOwned>(
        &self,
        index: TableDefinition<'static, &'static str, &'static str>,
        rows: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> DbResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(index)?;
        let Some(id) = index.get(key)? else {
            return Ok(None);
        };
        let rows = read_txn.open_table(rows)?;
        match rows.get(id.value())? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Verify the database can serve a read transaction.
    pub fn health_check(&self) -> DbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(APPLICATIONS)?;
        Ok(())
    }

    // =========================================================================
    // Companies
    // =========================================================================

    pub fn insert_company(&self, company: &Company) -> DbResult<()> {
        let json = encode(company)?;
        self.write(|txn| -> DbResult<()> {
            let mut emails = txn.open_table(COMPANY_EMAIL_INDEX)?;
            if emails.get(company.email.as_str())?.is_some() {
                return Err(DbError::Conflict(UniqueKey::CompanyEmail));
            }
            let mut rows = txn.open_table(COMPANIES)?;
            if rows.get(company.id.as_str())?.is_some() {
                return Err(DbError::Conflict(UniqueKey::CompanyId));
            }
            rows.insert(company.id.as_str(), json.as_slice())?;
            emails.insert(company.email.as_str(), company.id.as_str())?;
            Ok(())
        })
    }

    pub fn get_company(&self, company_id: &str) -> DbResult<Option<Company>> {
        self.get_row(COMPANIES, company_id)
    }

    /// Look up a company by its (already lowercased) email.
    pub fn find_company_by_email(&self, email: &str) -> DbResult<Option<Company>> {
        self.get_indexed(COMPANY_EMAIL_INDEX, COMPANIES, email)
    }

    // =========================================================================
    // Applications
    // =========================================================================

    pub fn insert_application(&self, app: &Application) -> DbResult<()> {
        let json = encode(app)?;
        self.write(|txn| -> DbResult<()> {
            let mut rows = txn.open_table(APPLICATIONS)?;
            if rows.get(app.id.as_str())?.is_some() {
                return Err(DbError::Conflict(UniqueKey::ApplicationId));
            }
            rows.insert(app.id.as_str(), json.as_slice())?;
            Ok(())
        })
    }

    pub fn get_application(&self, app_id: &str) -> DbResult<Option<Application>> {
        self.get_row(APPLICATIONS, app_id)
    }

    pub fn list_applications(&self) -> DbResult<Vec<Application>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(APPLICATIONS)?;
        let mut apps = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            apps.push(decode(value.value())?);
        }
        Ok(apps)
    }

    // =========================================================================
    // Credential index
    // =========================================================================

    pub fn put_credential(&self, secret_digest: &str, app_id: &str) -> DbResult<()> {
        self.write(|txn| -> DbResult<()> {
            let mut table = txn.open_table(CREDENTIAL_INDEX)?;
            table.insert(secret_digest, app_id)?;
            Ok(())
        })
    }

    pub fn get_credential(&self, secret_digest: &str) -> DbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDENTIAL_INDEX)?;
        Ok(table.get(secret_digest)?.map(|v| v.value().to_string()))
    }

    /// Atomically replace the whole credential index.
    pub fn replace_credentials(&self, entries: &[(String, String)]) -> DbResult<()> {
        self.write(|txn| -> DbResult<()> {
            txn.delete_table(CREDENTIAL_INDEX)?;
            let mut table = txn.open_table(CREDENTIAL_INDEX)?;
            for (digest, app_id) in entries {
                table.insert(digest.as_str(), app_id.as_str())?;
            }
            Ok(())
        })
    }

    // =========================================================================
    // Customers & Identities
    // =========================================================================

    /// Insert a new customer together with its first identity.
    ///
    /// Fails with `Conflict(CustomerEmailHash)` if another customer already
    /// owns the email hash; neither row is written in that case.
    pub fn insert_customer(&self, customer: &Customer, identity: &Identity) -> DbResult<()> {
        self.write(|txn| put_customer(txn, customer, identity))
    }

    pub fn find_customer_by_email_hash(&self, email_hash: &str) -> DbResult<Option<Customer>> {
        self.get_indexed(CUSTOMER_EMAIL_INDEX, CUSTOMERS, email_hash)
    }

    pub fn count_customers(&self) -> DbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CUSTOMERS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn list_identities(&self, customer_id: &str) -> DbResult<Vec<Identity>> {
        let (start, end) = identity_range(customer_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDENTITIES)?;
        let mut identities = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            identities.push(decode(value.value())?);
        }
        Ok(identities)
    }

    // =========================================================================
    // KYC Requests
    // =========================================================================

    /// Insert a KYC request, enforcing unique reference and token.
    pub fn insert_request(&self, request: &KycRequest) -> DbResult<()> {
        self.write(|txn| put_request(txn, request))
    }

    /// Insert a KYC request and, if given, the new customer it was filed for,
    /// in one write transaction.
    ///
    /// A request conflict rolls back the customer as well. If another writer
    /// already stored a customer with the same email hash, that customer is
    /// kept, the given one is dropped, and the stored one is returned.
    pub fn insert_request_with_customer(
        &self,
        request: &KycRequest,
        new_customer: Option<(&Customer, &Identity)>,
    ) -> DbResult<Option<Customer>> {
        self.write(|txn| -> DbResult<Option<Customer>> {
            let mut stored = None;
            if let Some((customer, identity)) = new_customer {
                match put_customer(txn, customer, identity) {
                    Ok(()) => {}
                    Err(DbError::Conflict(UniqueKey::CustomerEmailHash)) => {
                        stored = Some(customer_by_email_hash(txn, &customer.email_hash)?);
                    }
                    Err(e) => return Err(e),
                }
            }
            put_request(txn, request)?;
            Ok(stored)
        })
    }

    /// Number of requests using `reference` (0 or 1).
    pub fn count_by_reference(&self, reference: &str) -> DbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUEST_REFERENCE_INDEX)?;
        Ok(u64::from(table.get(reference)?.is_some()))
    }

    pub fn get_request(&self, request_id: &str) -> DbResult<Option<KycRequest>> {
        self.get_row(KYC_REQUESTS, request_id)
    }

    pub fn find_request_by_token(&self, kyc_token: &str) -> DbResult<Option<KycRequest>> {
        self.get_indexed(REQUEST_TOKEN_INDEX, KYC_REQUESTS, kyc_token)
    }

    /// Read-modify-write a request in one transaction.
    ///
    /// `mutate` sees the current row; returning `Err` aborts without writing.
    pub fn update_request<E, F>(&self, request_id: &str, mutate: F) -> Result<KycRequest, E>
    where
        E: From<DbError>,
        F: FnOnce(&mut KycRequest) -> Result<(), E>,
    {
        self.write(|txn| -> Result<KycRequest, E> {
            let mut table = txn.open_table(KYC_REQUESTS).map_err(DbError::from)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(request_id)
                    .map_err(DbError::from)?
                    .ok_or_else(|| DbError::NotFound(format!("KYC request {request_id}")))?;
                existing.value().to_vec()
            };

            let mut request: KycRequest = decode(&existing_bytes)?;
            mutate(&mut request)?;
            request.updated_at = Utc::now();

            let json = encode(&request)?;
            table
                .insert(request_id, json.as_slice())
                .map_err(DbError::from)?;
            Ok(request)
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

fn put_customer(txn: &WriteTransaction, customer: &Customer, identity: &Identity) -> DbResult<()> {
    let customer_json = encode(customer)?;
    let identity_json = encode(identity)?;

    let mut by_email = txn.open_table(CUSTOMER_EMAIL_INDEX)?;
    if by_email.get(customer.email_hash.as_str())?.is_some() {
        return Err(DbError::Conflict(UniqueKey::CustomerEmailHash));
    }
    let mut by_token = txn.open_table(CUSTOMER_TOKEN_INDEX)?;
    if by_token.get(customer.token.as_str())?.is_some() {
        return Err(DbError::Conflict(UniqueKey::CustomerToken));
    }

    let mut customers = txn.open_table(CUSTOMERS)?;
    customers.insert(customer.id.as_str(), customer_json.as_slice())?;
    by_email.insert(customer.email_hash.as_str(), customer.id.as_str())?;
    by_token.insert(customer.token.as_str(), customer.id.as_str())?;

    let mut identities = txn.open_table(IDENTITIES)?;
    let key = identity_key(&customer.id, &identity.id);
    identities.insert(key.as_str(), identity_json.as_slice())?;
    Ok(())
}

fn customer_by_email_hash(txn: &WriteTransaction, email_hash: &str) -> DbResult<Customer> {
    let by_email = txn.open_table(CUSTOMER_EMAIL_INDEX)?;
    let customer_id = by_email
        .get(email_hash)?
        .map(|id| id.value().to_string())
        .ok_or_else(|| DbError::NotFound("customer".to_string()))?;
    let customers = txn.open_table(CUSTOMERS)?;
    let row = customers
        .get(customer_id.as_str())?
        .ok_or_else(|| DbError::NotFound(format!("customer {customer_id}")))?;
    let customer: Customer = decode(row.value())?;
    Ok(customer)
}

fn put_request(txn: &WriteTransaction, request: &KycRequest) -> DbResult<()> {
    let json = encode(request)?;

    let mut by_reference = txn.open_table(REQUEST_REFERENCE_INDEX)?;
    if by_reference.get(request.reference.as_str())?.is_some() {
        return Err(DbError::Conflict(UniqueKey::RequestReference));
    }
    let mut by_token = txn.open_table(REQUEST_TOKEN_INDEX)?;
    if by_token.get(request.kyc_token.as_str())?.is_some() {
        return Err(DbError::Conflict(UniqueKey::RequestToken));
    }

    let mut rows = txn.open_table(KYC_REQUESTS)?;
    rows.insert(request.id.as_str(), json.as_slice())?;
    by_reference.insert(request.reference.as_str(), request.id.as_str())?;
    by_token.insert(request.kyc_token.as_str(), request.id.as_str())?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
