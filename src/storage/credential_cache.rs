// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret key → application id resolution.
//!
//! Two tiers:
//!
//! - an in-process LRU keyed by `sha256(secret)` for the hot path
//! - the durable `credential_index` table, so a restart or a cache eviction
//!   never turns a valid key into an authentication failure
//!
//! Raw secrets are never persisted; only their digests are.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::database::{DbResult, KycDatabase};
use crate::crypto::{sha256_hex, KeyEnvironment, SecretDeriver};

/// Default number of cached secret digests.
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct CredentialStore {
    cache: Mutex<LruCache<String, String>>,
    db: Arc<KycDatabase>,
}

impl CredentialStore {
    pub fn new(db: Arc<KycDatabase>, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            db,
        }
    }

    /// Register `secret` as belonging to `app_id` in both tiers.
    pub fn put(&self, secret: &str, app_id: &str) -> DbResult<()> {
        let digest = sha256_hex(secret);
        self.db.put_credential(&digest, app_id)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(digest, app_id.to_string());
        }
        Ok(())
    }

    /// Application id owning `secret`, if any.
    ///
    /// A cache miss falls through to the durable index and repopulates the
    /// cache on success.
    pub fn resolve(&self, secret: &str) -> DbResult<Option<String>> {
        let digest = sha256_hex(secret);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(app_id) = cache.get(&digest) {
                return Ok(Some(app_id.clone()));
            }
        }

        let Some(app_id) = self.db.get_credential(&digest)? else {
            return Ok(None);
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(digest, app_id.clone());
        }
        Ok(Some(app_id))
    }

    /// Re-derive every application's secrets and replace the durable index.
    ///
    /// Run at startup so a changed salt or a lost index heals itself.
    /// Returns the number of secrets registered.
    pub fn rebuild(&self, deriver: &SecretDeriver) -> DbResult<usize> {
        let mut entries = Vec::new();
        for app in self.db.list_applications()? {
            for env in KeyEnvironment::ALL {
                let secret = deriver.derive(app.public_key(env), env);
                entries.push((sha256_hex(&secret), app.id.clone()));
            }
        }
        self.db.replace_credentials(&entries)?;
        self.clear_cache();
        Ok(entries.len())
    }

    /// Drop every cached entry; the durable index is untouched.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Number of cached digests.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
