// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope encryption for PII blobs.
//!
//! ## Format
//!
//! ```text
//! hex(nonce) ":" hex(ciphertext || tag)
//! ```
//!
//! - Cipher: AES-256-GCM (`ring::aead::AES_256_GCM`)
//! - Nonce: 96 bits, freshly drawn from the system RNG for every call
//! - Tag: 128 bits, appended to the ciphertext
//! - No associated data
//!
//! The key is supplied by configuration and validated once at startup.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use super::CryptoError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the hex-encoded key accepted by [`CryptoEnvelope::from_hex`].
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

/// Separator between the nonce and ciphertext halves.
const SEPARATOR: char = ':';

/// Symmetric authenticated encryption of PII using one shared key.
pub struct CryptoEnvelope {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for CryptoEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoEnvelope")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

impl CryptoEnvelope {
    /// Build an envelope from raw key bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::MisconfiguredKey);
        }
        let unbound =
            UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::MisconfiguredKey)?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Build an envelope from a 64-character hex key.
    pub fn from_hex(key_hex: &str) -> Result<Self, CryptoError> {
        let key_hex = key_hex.trim();
        if key_hex.len() != KEY_HEX_LEN {
            return Err(CryptoError::MisconfiguredKey);
        }
        let key = hex::decode(key_hex).map_err(|_| CryptoError::MisconfiguredKey)?;
        Self::new(&key)
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CryptoError::RandomnessUnavailable)?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CryptoError::SealFailed)?;

        Ok(format!(
            "{}{SEPARATOR}{}",
            hex::encode(nonce_bytes),
            hex::encode(&in_out)
        ))
    }

    /// Convenience wrapper for UTF-8 plaintext.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Open an envelope produced by [`encrypt`](Self::encrypt).
    ///
    /// Structural problems yield `MalformedEnvelope`; a failed tag check
    /// yields `TamperedData`. No plaintext is returned on any failure.
    pub fn decrypt(&self, envelope: &str) -> Result<Vec<u8>, CryptoError> {
        let (nonce_hex, ciphertext_hex) = envelope
            .split_once(SEPARATOR)
            .ok_or(CryptoError::MalformedEnvelope("missing nonce separator"))?;

        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|_| CryptoError::MalformedEnvelope("nonce is not valid hex"))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope("nonce has the wrong length"))?;

        let mut in_out = hex::decode(ciphertext_hex)
            .map_err(|_| CryptoError::MalformedEnvelope("ciphertext is not valid hex"))?;
        if in_out.len() < AES_256_GCM.tag_len() {
            return Err(CryptoError::MalformedEnvelope(
                "ciphertext is shorter than the authentication tag",
            ));
        }

        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::TamperedData)?;

        Ok(plaintext.to_vec())
    }

    /// Open an envelope whose plaintext is UTF-8.
    pub fn decrypt_string(&self, envelope: &str) -> Result<String, CryptoError> {
        let bytes = self.decrypt(envelope)?;
        String::from_utf8(bytes)
            .map_err(|_| CryptoError::MalformedEnvelope("plaintext is not valid UTF-8"))
    }
}
