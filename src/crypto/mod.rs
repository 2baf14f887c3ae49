// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cryptography
//!
//! - `envelope` - AES-256-GCM envelopes for PII at rest (`hex(nonce):hex(ct||tag)`)
//! - `secrets` - HMAC-SHA256 derivation of per-application secret keys
//! - `tokens` - random hex tokens and the normalized email hash
//!
//! None of these functions perform I/O. Error messages never contain
//! plaintext or key material.

pub mod envelope;
pub mod secrets;
pub mod tokens;

pub use envelope::CryptoEnvelope;
pub use secrets::{KeyEnvironment, SecretDeriver};
pub use tokens::{generate_hex_token, hash_email, mask_secret, normalize_email, sha256_hex};

/// Errors raised by the cryptographic primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Encryption key absent or not exactly 256 bits.
    #[error("encryption key is missing or is not a 256-bit key")]
    MisconfiguredKey,

    /// HMAC salt absent or too short.
    #[error("secret salt is missing or too short")]
    MisconfiguredSalt,

    /// Envelope is not `hex(nonce):hex(ciphertext)` with a valid nonce.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// AEAD tag check failed: the nonce, ciphertext or tag was altered,
    /// or the envelope was sealed under a different key.
    #[error("envelope failed authentication")]
    TamperedData,

    /// The operating system RNG could not be read.
    #[error("secure random number generator unavailable")]
    RandomnessUnavailable,

    /// Sealing failed inside the AEAD implementation.
    #[error("encryption failed")]
    SealFailed,
}
