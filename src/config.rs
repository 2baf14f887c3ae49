// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup and fully
//! validated before the server binds. A bad key or salt stops the process;
//! nothing is re-read per request.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ENCRYPTION_KEY` | AES-256 key, 64 hex characters | Required |
//! | `SECRET_SALT` | HMAC salt for secret key derivation, at least 16 bytes | Required |
//! | `DATA_DIR` | Directory holding `kyc.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `ALLOW_URL_BASE` | Base URL the request token is appended to | `http://127.0.0.1:5173/` |
//! | `CREDENTIAL_CACHE_CAPACITY` | Secret key LRU capacity | `10000` |
//! | `ENFORCE_TOKEN_EXPIRY` | Refuse fetches of expired request tokens | `false` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key; both set enables HTTPS | Unset |
//! | `SEED_COMPANY_NAME` / `SEED_COMPANY_EMAIL` / `SEED_APP_NAME` | Provision a first application at startup | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use url::Url;

use crate::crypto::envelope::{KEY_HEX_LEN, KEY_LEN};
use crate::crypto::SecretDeriver;
use crate::kyc::ledger::DEFAULT_ALLOW_URL_BASE;
use crate::storage::credential_cache::DEFAULT_CAPACITY;

pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";
pub const SECRET_SALT_ENV: &str = "SECRET_SALT";

/// Directory for the database file.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const ALLOW_URL_BASE_ENV: &str = "ALLOW_URL_BASE";
pub const CREDENTIAL_CACHE_CAPACITY_ENV: &str = "CREDENTIAL_CACHE_CAPACITY";
pub const ENFORCE_TOKEN_EXPIRY_ENV: &str = "ENFORCE_TOKEN_EXPIRY";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const SEED_COMPANY_NAME_ENV: &str = "SEED_COMPANY_NAME";
pub const SEED_COMPANY_EMAIL_ENV: &str = "SEED_COMPANY_EMAIL";
pub const SEED_APP_NAME_ENV: &str = "SEED_APP_NAME";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("ENCRYPTION_KEY must be 64 hex characters")]
    InvalidEncryptionKey,

    #[error("SECRET_SALT must be at least 16 bytes")]
    InvalidSecretSalt,

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    IncompleteTls,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// PEM files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// First application to provision when the database has none for this email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub company_name: String,
    pub company_email: String,
    pub app_name: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub encryption_key: [u8; KEY_LEN],
    pub secret_salt: Vec<u8>,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub allow_url_base: Url,
    pub credential_cache_capacity: usize,
    pub enforce_token_expiry: bool,
    pub tls: Option<TlsPaths>,
    pub seed: Option<SeedConfig>,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("encryption_key", &"<redacted>")
            .field("secret_salt", &"<redacted>")
            .field("data_dir", &self.data_dir)
            .field("bind_addr", &self.bind_addr)
            .field("allow_url_base", &self.allow_url_base.as_str())
            .field("credential_cache_capacity", &self.credential_cache_capacity)
            .field("enforce_token_expiry", &self.enforce_token_expiry)
            .field("tls", &self.tls)
            .field("seed", &self.seed)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Unset and blank are the same thing
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let key_hex = get(ENCRYPTION_KEY_ENV).ok_or(ConfigError::Missing(ENCRYPTION_KEY_ENV))?;
        let encryption_key = parse_key(&key_hex)?;

        let secret_salt = get(SECRET_SALT_ENV)
            .ok_or(ConfigError::Missing(SECRET_SALT_ENV))?
            .into_bytes();
        if secret_salt.len() < SecretDeriver::MIN_SALT_LEN {
            return Err(ConfigError::InvalidSecretSalt);
        }

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        let host: IpAddr = get(HOST_ENV)
            .unwrap_or_else(|| DEFAULT_HOST.into())
            .trim()
            .parse()
            .map_err(|e: std::net::AddrParseError| invalid(HOST_ENV, e))?;
        let port = match get(PORT_ENV) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid(PORT_ENV, e))?,
            None => DEFAULT_PORT,
        };

        let allow_url_base = parse_allow_url_base(
            &get(ALLOW_URL_BASE_ENV).unwrap_or_else(|| DEFAULT_ALLOW_URL_BASE.into()),
        )?;

        let credential_cache_capacity = match get(CREDENTIAL_CACHE_CAPACITY_ENV) {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid(CREDENTIAL_CACHE_CAPACITY_ENV, "expected a positive integer")),
            },
            None => DEFAULT_CAPACITY,
        };

        let enforce_token_expiry = match get(ENFORCE_TOKEN_EXPIRY_ENV) {
            Some(v) => parse_bool(ENFORCE_TOKEN_EXPIRY_ENV, &v)?,
            None => false,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };

        let seed = get(SEED_COMPANY_EMAIL_ENV).map(|company_email| SeedConfig {
            company_name: get(SEED_COMPANY_NAME_ENV).unwrap_or_else(|| "Default Company".into()),
            company_email,
            app_name: get(SEED_APP_NAME_ENV).unwrap_or_else(|| "default".into()),
        });

        let log_format = match get(LOG_FORMAT_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            None => LogFormat::Pretty,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(v) if v == "json" => LogFormat::Json,
            Some(_) => return Err(invalid(LOG_FORMAT_ENV, "expected 'json' or 'pretty'")),
        };

        Ok(Self {
            encryption_key,
            secret_salt,
            data_dir,
            bind_addr: SocketAddr::new(host, port),
            allow_url_base,
            credential_cache_capacity,
            enforce_token_expiry,
            tls,
            seed,
            log_format,
        })
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn parse_key(key_hex: &str) -> Result<[u8; KEY_LEN], ConfigError> {
    let key_hex = key_hex.trim();
    if key_hex.len() != KEY_HEX_LEN {
        return Err(ConfigError::InvalidEncryptionKey);
    }
    let bytes = hex::decode(key_hex).map_err(|_| ConfigError::InvalidEncryptionKey)?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidEncryptionKey)
}

/// Parse and normalize to a trailing `/` so the token appends cleanly.
fn parse_allow_url_base(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(ALLOW_URL_BASE_ENV, e))?;
    if url.cannot_be_a_base() {
        return Err(invalid(ALLOW_URL_BASE_ENV, "URL cannot be a base"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(ALLOW_URL_BASE_ENV, "query and fragment are not allowed"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, "expected a boolean")),
    }
}
