// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorBody,
    models::{
        CustomerInput, CustomerView, FetchKycResponse, IdentityInput, IdentityView,
        InitiateKycResponse, KycRequestInput,
    },
    state::AppState,
};

pub mod health;
pub mod kyc;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/allow", post(kyc::initiate_kyc))
        .route("/allow/{kyc_token}", get(kyc::fetch_kyc));

    Router::new()
        .nest("/api/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        kyc::initiate_kyc,
        kyc::fetch_kyc,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            KycRequestInput,
            CustomerInput,
            IdentityInput,
            InitiateKycResponse,
            FetchKycResponse,
            CustomerView,
            IdentityView,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "KYC", description = "KYC request creation and token-bound retrieval"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CREDENTIAL_HEADER;
    use crate::kyc::NewApplication;
    use crate::models::AppMode;
    use crate::state::testing::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    const BODY: &str = r#"{
        "customer": {
            "name": "John Doe",
            "email": "john@x.com",
            "address": "1 Main St",
            "identity": { "type": "BVN", "number": "12345678901" }
        },
        "reference": "ref-1",
        "redirect_url": "https://r",
        "kyc_level": "tier_1",
        "bank_accounts": true
    }"#;

    fn post_allow(key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/allow")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(CREDENTIAL_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn provision_key(state: &AppState) -> String {
        let company = state
            .applications
            .create_company("Acme", "ops@acme.test", None)
            .unwrap();
        state
            .applications
            .provision(NewApplication {
                company_id: company.id,
                name: "checkout".into(),
                display_name: "Checkout".into(),
                mode: AppMode::Sandbox,
                webhook_url: None,
            })
            .unwrap()
            .test_secret_key
    }

    #[tokio::test]
    async fn create_requires_api_key() {
        let (state, _dir) = test_state();
        let response = router(state)
            .oneshot(post_allow(None, BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["error_code"], "unauthenticated");
    }

    #[tokio::test]
    async fn unknown_api_key_is_unauthorized() {
        let (state, _dir) = test_state();
        let response = router(state)
            .oneshot(post_allow(Some("sk_test_nope"), BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "unauthorized");
    }

    #[tokio::test]
    async fn create_and_fetch_over_http() {
        let (state, _dir) = test_state();
        let key = provision_key(&state);
        let app = router(state);

        let response = app
            .clone()
            .oneshot(post_allow(Some(&key), BODY))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let created = json_body(response).await;
        assert_eq!(created["error"], false);
        assert_eq!(created["message"], "KYC process initiated successfully");
        assert_eq!(created["results"]["reference"], "ref-1");
        assert_eq!(created["results"]["bank_accounts"], true);
        assert_eq!(created["results"]["kyc_level"], "tier_1");
        assert_eq!(created["results"]["is_blacklisted"], false);

        let token = created["results"]["id"].as_str().unwrap().to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/allow/{token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = json_body(response).await;
        assert_eq!(fetched["results"]["status"], "initiated");
        assert_eq!(fetched["results"]["bank_accounts_requested"], true);
        assert_eq!(
            fetched["results"]["customer"]["token"],
            created["results"]["customer"]
        );
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (state, _dir) = test_state();
        let key = provision_key(&state);
        let response = router(state)
            .oneshot(post_allow(Some(&key), "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "validation_error");
    }

    #[tokio::test]
    async fn health_routes_respond() {
        let (state, _dir) = test_state();
        let app = router(state);
        for uri in ["/health", "/health/live", "/health/ready"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }
}
