// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Confam KYC Server - API credentials and KYC request service
//!
//! Issues derived secret keys to client applications and runs the KYC
//! request lifecycle with customer PII encrypted at rest.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) and webhook notifier
//! - `auth` - Secret key authentication (`x-allow-key`)
//! - `crypto` - AES-256-GCM envelopes, HMAC key derivation, tokens
//! - `kyc` - Customer registry, request ledger, provisioning
//! - `storage` - redb database and credential cache

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod crypto;
pub mod error;
pub mod kyc;
pub mod models;
pub mod state;
pub mod storage;
pub mod telemetry;
