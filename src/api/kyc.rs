// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    api::webhook::{InitiationPayload, KYC_INITIATION_REQUESTED},
    auth::AppAuth,
    error::{ApiError, ErrorBody},
    models::{ApiEnvelope, FetchKycResponse, InitiateKycResponse, KycRequestInput},
    state::AppState,
};

pub const INITIATED_MESSAGE: &str = "KYC process initiated successfully";
pub const FETCHED_MESSAGE: &str = "KYC request fetched successfully";

#[utoipa::path(
    post,
    path = "/api/v1/allow",
    request_body = KycRequestInput,
    tag = "KYC",
    params(
        ("x-allow-key" = String, Header, description = "Application secret key (sk_test_… or sk_live_…)")
    ),
    responses(
        (status = 200, body = ApiEnvelope<InitiateKycResponse>),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 401, description = "Missing or invalid API key", body = ErrorBody),
        (status = 409, description = "Reference already used", body = ErrorBody)
    )
)]
pub async fn initiate_kyc(
    AppAuth(resolved): AppAuth,
    State(state): State<AppState>,
    payload: Result<Json<KycRequestInput>, JsonRejection>,
) -> Result<Json<ApiEnvelope<InitiateKycResponse>>, ApiError> {
    let Json(input) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let created = state.ledger.create(&resolved.application, &input)?;

    let webhook_url = resolved
        .application
        .webhook_url
        .as_ref()
        .or(resolved.company.webhook_url.as_ref());
    if let Some(url) = webhook_url {
        // Delivery runs detached
        let _ = state.webhooks.notify(
            url.clone(),
            KYC_INITIATION_REQUESTED,
            InitiationPayload::new(&resolved.application, &created.request),
        );
    }

    Ok(Json(ApiEnvelope::ok(
        INITIATED_MESSAGE,
        InitiateKycResponse::new(&created.request, &created.customer),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/allow/{kyc_token}",
    params(
        ("kyc_token" = String, Path, description = "Request token returned by the create call")
    ),
    tag = "KYC",
    responses(
        (status = 200, body = ApiEnvelope<FetchKycResponse>),
        (status = 403, description = "Request already completed or failed", body = ErrorBody),
        (status = 404, description = "Unknown token", body = ErrorBody),
        (status = 410, description = "Token expired", body = ErrorBody)
    )
)]
pub async fn fetch_kyc(
    Path(kyc_token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiEnvelope<FetchKycResponse>>, ApiError> {
    let kyc_token = kyc_token.trim();
    if kyc_token.is_empty() {
        return Err(ApiError::bad_request("Missing KYC token"));
    }

    let fetched = state.ledger.fetch(kyc_token)?;
    Ok(Json(ApiEnvelope::ok(FETCHED_MESSAGE, fetched.to_response())))
}
