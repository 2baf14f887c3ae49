// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-application secret key derivation.
//!
//! Every application carries two public identifiers, one per environment.
//! Its secret keys are never stored; they are recomputed on demand as
//!
//! ```text
//! secret = env_tag "_" hex(HMAC-SHA256(salt, public_identifier))
//! ```
//!
//! where `env_tag` is `sk_test` or `sk_live`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{generate_hex_token, CryptoError};

type HmacSha256 = Hmac<Sha256>;

/// Environment a key pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEnvironment {
    Test,
    Live,
}

impl KeyEnvironment {
    pub const ALL: [KeyEnvironment; 2] = [KeyEnvironment::Test, KeyEnvironment::Live];

    /// Tag prefixed to derived secret keys.
    pub fn secret_tag(self) -> &'static str {
        match self {
            KeyEnvironment::Test => "sk_test",
            KeyEnvironment::Live => "sk_live",
        }
    }

    /// Tag prefixed to public identifiers.
    pub fn public_tag(self) -> &'static str {
        match self {
            KeyEnvironment::Test => "pk_test",
            KeyEnvironment::Live => "pk_live",
        }
    }

    /// Environment encoded in a presented secret, if the tag is recognised.
    pub fn of_secret(secret: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|env| {
            secret
                .strip_prefix(env.secret_tag())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }
}

/// Holds the validated shared salt and derives secrets from it.
#[derive(Clone)]
pub struct SecretDeriver {
    keyed: HmacSha256,
}

impl std::fmt::Debug for SecretDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretDeriver { salt: <redacted> }")
    }
}

impl SecretDeriver {
    /// Minimum salt length accepted at startup.
    pub const MIN_SALT_LEN: usize = 16;

    pub fn new(salt: &[u8]) -> Result<Self, CryptoError> {
        if salt.len() < Self::MIN_SALT_LEN {
            return Err(CryptoError::MisconfiguredSalt);
        }
        let keyed =
            HmacSha256::new_from_slice(salt).map_err(|_| CryptoError::MisconfiguredSalt)?;
        Ok(Self { keyed })
    }

    /// Derive the secret key for `public_identifier` in `env`.
    pub fn derive(&self, public_identifier: &str, env: KeyEnvironment) -> String {
        let mut mac = self.keyed.clone();
        mac.update(public_identifier.as_bytes());
        format!(
            "{}_{}",
            env.secret_tag(),
            hex::encode(mac.finalize().into_bytes())
        )
    }

    /// Generate a fresh public identifier, e.g. `pk_live_<32 hex>`.
    pub fn generate_public_identifier(env: KeyEnvironment) -> Result<String, CryptoError> {
        Ok(format!("{}_{}", env.public_tag(), generate_hex_token()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &[u8] = b"0123456789abcdef-salt";

    #[test]
    fn matches_known_hmac_vector() {
        let secret = SecretDeriver::new(SALT)
            .unwrap()
            .derive("pk_test_00", KeyEnvironment::Test);
        assert_eq!(
            secret,
            "sk_test_5231804d2b8793566537818a96e996cf198ff3f167250647c1ab96a12c216521"
        );
    }

    #[test]
    fn derivation_is_deterministic_and_salt_dependent() {
        let a = SecretDeriver::new(SALT).unwrap();
        let b = SecretDeriver::new(b"another-salt-value!!").unwrap();
        let first = a.derive("pk_test_1", KeyEnvironment::Test);
        assert_eq!(first, a.derive("pk_test_1", KeyEnvironment::Test));
        assert_ne!(first, b.derive("pk_test_1", KeyEnvironment::Test));
        assert_ne!(first, a.derive("pk_test_2", KeyEnvironment::Test));
    }

    #[test]
    fn secrets_carry_environment_tag() {
        let deriver = SecretDeriver::new(SALT).unwrap();
        let test = deriver.derive("pk", KeyEnvironment::Test);
        let live = deriver.derive("pk", KeyEnvironment::Live);
        assert!(test.starts_with("sk_test_"));
        assert!(live.starts_with("sk_live_"));
        assert_eq!(KeyEnvironment::of_secret(&test), Some(KeyEnvironment::Test));
        assert_eq!(KeyEnvironment::of_secret(&live), Some(KeyEnvironment::Live));
        assert_eq!(KeyEnvironment::of_secret("sk_testing"), None);
        assert_eq!(KeyEnvironment::of_secret("pk_test_x"), None);
    }

    #[test]
    fn public_identifiers_are_tagged_random_hex() {
        let a = SecretDeriver::generate_public_identifier(KeyEnvironment::Live).unwrap();
        let b = SecretDeriver::generate_public_identifier(KeyEnvironment::Live).unwrap();
        assert!(a.starts_with("pk_live_"));
        assert_eq!(a.len(), "pk_live_".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn short_salt_is_rejected() {
        assert_eq!(
            SecretDeriver::new(b"short").unwrap_err(),
            CryptoError::MisconfiguredSalt
        );
        let rendered = format!("{:?}", SecretDeriver::new(SALT).unwrap());
        assert!(!rendered.contains("salt-"));
    }
}
