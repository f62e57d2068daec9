//! Handler-level coverage of the HTTP surface: auth extraction, status codes,
//! and the response envelope, driven through the full router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::TestApp;
use cropmate_api::auth::AuthUser;

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn authed_post(path: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn order_body(app: &TestApp) -> Value {
    json!({
        "crop_id": app.crop_id,
        "quantity": 2,
        "delivery_address": "14 Mabini St, Quezon City",
        "payment_proof": {
            "file_name": "payment.png",
            "content_type": "image/png",
            "data": base64::engine::general_purpose::STANDARD.encode(b"png bytes"),
        },
    })
}

async fn create_order_http(app: &TestApp, token: &str) -> Value {
    let (status, body) = send(
        app.router(),
        authed_post("/api/v1/orders", token, order_body(app)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].clone()
}

#[tokio::test]
async fn status_and_health_are_public() {
    let app = TestApp::spawn().await;

    let (status, body) = send(
        app.router(),
        Request::get("/api/v1/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["service"], json!("cropmate-api"));

    let (status, body) = send(
        app.router(),
        Request::get("/api/v1/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["checks"]["database"], json!("healthy"));
}

#[tokio::test]
async fn missing_or_garbage_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let (status, _) = send(
        app.router(),
        Request::get("/api/v1/orders").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        app.router(),
        Request::get("/api/v1/orders")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Unauthorized"));
}

#[tokio::test]
async fn order_flow_end_to_end_over_http() {
    let app = TestApp::spawn().await;
    let customer_token = app.token_for(&app.customer);
    let farmer_token = app.token_for(&app.farmer);

    let order = create_order_http(&app, &customer_token).await;
    assert_eq!(order["status"], json!("PendingPayment"));
    let total: Decimal = order["total_price"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, dec!(21.00));
    let order_id = order["id"].as_str().unwrap().to_string();

    // Customers cannot confirm their own payment.
    let confirm_path = format!("/api/v1/orders/{order_id}/confirm-payment");
    let (status, _) = send(
        app.router(),
        authed_post(&confirm_path, &customer_token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        app.router(),
        authed_post(&confirm_path, &farmer_token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("PaymentReceived"));
}

#[tokio::test]
async fn unknown_order_is_a_not_found_error_body() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.customer);

    let (status, body) = send(
        app.router(),
        Request::get(format!("/api/v1/orders/{}", Uuid::new_v4()))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Not Found"));
}

#[tokio::test]
async fn customers_cannot_see_other_buyers_orders() {
    let app = TestApp::spawn().await;
    let order = create_order_http(&app, &app.token_for(&app.customer)).await;
    let order_id = order["id"].as_str().unwrap();

    let other_customer = AuthUser {
        user_id: Uuid::new_v4(),
        role: cropmate_api::auth::UserRole::Customer,
        token_id: "other".into(),
    };
    let (status, _) = send(
        app.router(),
        Request::get(format!("/api/v1/orders/{order_id}"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", app.token_for(&other_customer)),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
