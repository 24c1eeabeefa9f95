//! API Integration Tests
//!
//! Router-level tests driven through `tower::ServiceExt::oneshot`. Tests
//! that touch PostgreSQL are marked `#[ignore]` and expect `DATABASE_URL`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use student_wallet::api::{self, AppState};
use student_wallet::gateway::{PaymentGatewayRegistry, StripeGateway};

mod common;

const WEBHOOK_SECRET: &str = "whsec_test";

fn test_gateways() -> PaymentGatewayRegistry {
    PaymentGatewayRegistry::new().register(Arc::new(StripeGateway::new(WEBHOOK_SECRET.to_string())))
}

fn app_with(pool: PgPool) -> Router {
    api::create_router().with_state(AppState {
        pool,
        gateways: Arc::new(test_gateways()),
        default_currency: "EGP".to_string(),
    })
}

/// Router over a pool that never connects; good enough for requests
/// rejected before any query runs
fn app_without_db() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .unwrap();
    app_with(pool)
}

fn stripe_signature(payload: &[u8]) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

async fn body_json(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn decimal_field(json: &Value, field: &str) -> Decimal {
    json[field]
        .as_str()
        .unwrap_or_else(|| panic!("{field} missing from {json}"))
        .parse()
        .unwrap()
}

// =========================================================================
// Request validation (no database needed)
// =========================================================================

#[tokio::test]
async fn test_webhook_unknown_provider_rejected() {
    let app = app_without_db();

    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/bitcoin")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error_code"], "unsupported_provider");
}

#[tokio::test]
async fn test_webhook_bad_signature_rejected() {
    let app = app_without_db();

    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"data":{"object":{}}}"#))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error_code"], "invalid_webhook_signature");
}

#[tokio::test]
async fn test_recharge_rejects_unknown_provider() {
    let app = app_without_db();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/wallets/{}/recharges", Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "amount": "100.00",
                "payment_provider": "bitcoin",
                "callback_url": "https://app.example.com/wallet/return"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error_code"], "unsupported_provider");
}

#[tokio::test]
async fn test_recharge_rejects_missing_callback() {
    let app = app_without_db();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/wallets/{}/recharges", Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "amount": "100.00",
                "payment_provider": "stripe",
                "callback_url": ""
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn test_purchase_rejects_nil_lecture() {
    let app = app_without_db();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/lectures/{}/purchases/wallet", Uuid::nil()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "wallet_id": Uuid::new_v4(),
                "student_id": Uuid::new_v4(),
                "amount": "10.00"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error_code"], "invalid_request");
}

// =========================================================================
// Wallet queries
// =========================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_wallet_queries() {
    let pool = common::setup_test_db().await;
    let app = app_with(pool.clone());

    let student_id = Uuid::new_v4();
    let wallet_id = common::seed_wallet(&pool, student_id, dec!(150)).await;

    // Detail by wallet id
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["student_id"], student_id.to_string());
    assert_eq!(decimal_field(&json, "balance"), dec!(150));
    assert_eq!(json["currency"], "EGP");
    assert_eq!(json["is_active"], true);

    // Lookup by student
    let req = Request::builder()
        .method("GET")
        .uri(format!("/students/{student_id}/wallet"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], wallet_id.to_string());

    // Paged listing
    let req = Request::builder()
        .method("GET")
        .uri("/wallets?page=1&page_size=10")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["wallets"].as_array().unwrap().len(), 1);

    // Unknown wallet is a 404
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "wallet_not_found");
}

// =========================================================================
// Recharge end to end: issue over HTTP, settle through the webhook
// =========================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_recharge_webhook_e2e() {
    let pool = common::setup_test_db().await;
    let app = app_with(pool.clone());

    let student_id = Uuid::new_v4();
    let wallet_id = common::seed_wallet(&pool, student_id, dec!(0)).await;

    // 1. Issue a recharge
    let req = Request::builder()
        .method("POST")
        .uri(format!("/wallets/{wallet_id}/recharges"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "amount": "250.00",
                "payment_provider": "stripe",
                "callback_url": "https://app.example.com/wallet/return"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Recharge issue failed");
    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    let reference = json["provider_reference_id"].as_str().unwrap().to_string();
    assert!(json["client_payment_token"]
        .as_str()
        .unwrap()
        .contains("_secret_"));

    // 2. The pending view shows it
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}/recharges/pending"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["recharges"].as_array().unwrap().len(), 1);

    // 3. Provider confirms through a signed webhook
    let payload = json!({
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": reference,
                "object": "payment_intent",
                "status": "succeeded",
                "amount_received": 25000
            }
        }
    })
    .to_string();
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json")
        .header("Stripe-Signature", stripe_signature(payload.as_bytes()))
        .body(Body::from(payload.clone()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "Webhook rejected");
    let json = body_json(response).await;
    assert_eq!(json["applied"], true);

    // 4. The balance was credited
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(decimal_field(&json, "balance"), dec!(250));

    // 5. A replayed webhook is acknowledged but changes nothing
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json")
        .header("Stripe-Signature", stripe_signature(payload.as_bytes()))
        .body(Body::from(payload))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["applied"], false);

    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(decimal_field(&json, "balance"), dec!(250));

    // 6. The ledger carries exactly one recharge credit
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}/ledger-entries"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entry_type"], "credit");
    assert_eq!(entries[0]["source"], "recharge");

    // 7. The recharge total reflects it
    let req = Request::builder()
        .method("GET")
        .uri(format!("/wallets/{wallet_id}/recharges/total"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(decimal_field(&json, "total"), dec!(250));
}

// =========================================================================
// Wallet status flips
// =========================================================================

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_deactivate_reactivate_flow() {
    let pool = common::setup_test_db().await;
    let app = app_with(pool.clone());

    let student_id = Uuid::new_v4();
    let wallet_id = common::seed_wallet(&pool, student_id, dec!(40)).await;

    // Deactivate
    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/wallets/{wallet_id}/deactivate"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["is_active"], false);
    assert_eq!(json["changed"], true);

    // Deactivating again is a no-op
    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/wallets/{wallet_id}/deactivate"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["changed"], false);

    // A frozen wallet cannot be recharged
    let req = Request::builder()
        .method("POST")
        .uri(format!("/wallets/{wallet_id}/recharges"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "amount": "50.00",
                "payment_provider": "stripe",
                "callback_url": "https://app.example.com/wallet/return"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "wallet_not_active");

    // Nor spent from
    let req = Request::builder()
        .method("POST")
        .uri(format!("/lectures/{}/purchases/wallet", Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "wallet_id": wallet_id,
                "student_id": student_id,
                "amount": "10.00"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error_code"], "wallet_not_active");

    // Reactivate restores spending
    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/wallets/{wallet_id}/reactivate"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["is_active"], true);
    assert_eq!(json["changed"], true);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/lectures/{}/purchases/wallet", Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "wallet_id": wallet_id,
                "student_id": student_id,
                "amount": "10.00"
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(decimal_field(&json, "balance"), dec!(30));
}
