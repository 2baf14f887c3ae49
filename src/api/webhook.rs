// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Best-effort webhook delivery.
//!
//! Events are POSTed as `{ "event": ..., "data": ... }` from a spawned task.
//! Failures are logged and never reach the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::models::{Application, KycLevel, KycRequest, RequestStatus};

pub const KYC_INITIATION_REQUESTED: &str = "kyc.initiation.requested";

/// Delivery timeout for a single webhook.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
pub struct WebhookEvent<T: Serialize> {
    pub event: &'static str,
    pub data: T,
}

/// Data of a `kyc.initiation.requested` event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InitiationPayload {
    pub app: String,
    pub business: String,
    pub id: String,
    pub status: RequestStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub kyc_level: KycLevel,
    pub bank_accounts: bool,
    pub is_blacklisted: bool,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl InitiationPayload {
    pub fn new(application: &Application, request: &KycRequest) -> Self {
        Self {
            app: application.id.clone(),
            business: application.company_id.clone(),
            id: request.id.clone(),
            status: request.status,
            reference: request.reference.clone(),
            created_at: request.created_at,
            kyc_level: request.kyc_level,
            bank_accounts: request.bank_accounts_requested,
            is_blacklisted: false,
            meta: serde_json::Map::new(),
        }
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Deliver on a spawned task.
    ///
    /// Callers may drop the handle; awaiting it yields the response status,
    /// or `None` if delivery failed.
    pub fn notify<T>(
        &self,
        url: String,
        event: &'static str,
        data: T,
    ) -> JoinHandle<Option<StatusCode>>
    where
        T: Serialize + Send + 'static,
    {
        let client = self.client.clone();
        tokio::spawn(async move {
            let body = WebhookEvent { event, data };
            match client.post(&url).json(&body).send().await {
                Ok(response) => {
                    tracing::info!(webhook_event = event, status = %response.status(), "Webhook delivered");
                    Some(response.status())
                }
                Err(e) => {
                    tracing::warn!(webhook_event = event, error = %e, "Webhook delivery failed");
                    None
                }
            }
        })
    }
}
