// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Opaque tokens and one-way identifiers.

use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use super::CryptoError;

/// Random bytes behind every opaque token (customer, request, public key).
pub const TOKEN_BYTES: usize = 16;

/// Number of leading characters kept when a secret is written to logs.
const MASK_PREFIX_LEN: usize = 6;

/// Generate a 32-character hex token from 16 CSPRNG bytes.
pub fn generate_hex_token() -> Result<String, CryptoError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CryptoError::RandomnessUnavailable)?;
    Ok(hex::encode(bytes))
}

/// Canonical form of an email used for deduplication.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Deterministic SHA-256 of the normalized email, hex-encoded.
pub fn hash_email(email: &str) -> String {
    sha256_hex(&normalize_email(email))
}

/// Hex-encoded SHA-256 of `value` with no normalization.
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Prefix of a secret that is safe to log.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(MASK_PREFIX_LEN).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_tokens_are_32_chars_and_unique() {
        let a = generate_hex_token().unwrap();
        let b = generate_hex_token().unwrap();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn email_hash_ignores_case_and_surrounding_whitespace() {
        assert_eq!(hash_email(" A@B.com "), hash_email("a@b.com"));
        assert_eq!(hash_email("\tJohn@X.COM\n"), hash_email("john@x.com"));
        assert_ne!(hash_email("a@b.com"), hash_email("b@b.com"));
    }

    #[test]
    fn email_hash_is_sha256_of_normalized_value() {
        // sha256("a@b.com")
        assert_eq!(
            hash_email("a@b.com"),
            "fb98d44ad7501a959f3f4f4a3f004fe2d9e581ea6207e218c4b02c08a4d75adf"
        );
    }

    #[test]
    fn mask_keeps_only_prefix() {
        assert_eq!(mask_secret("sk_test_abcdef"), "sk_tes...");
        assert_eq!(mask_secret("ab"), "ab...");
    }
}
