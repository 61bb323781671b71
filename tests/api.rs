use pretty_assertions::assert_eq;
use salvo::{
    http::StatusCode,
    test::{ResponseExt, TestClient},
};
use serde_json::{json, Value};
use serial_test::serial;

use crate::setup::{test_service, url, webhook_signature};

mod setup;

#[tokio::test]
#[serial]
async fn root_describes_api() {
    let service = test_service();

    let mut res = TestClient::get(url("/")).send(&service).await;

    assert_eq!(res.status_code(), Some(StatusCode::OK));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body, json!({"message": "Video Editor API", "version": "1.0.0"}));
}

#[tokio::test]
#[serial]
async fn health_check() {
    let service = test_service();

    let mut res = TestClient::get(url("/health")).send(&service).await;

    assert_eq!(res.status_code(), Some(StatusCode::OK));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[serial]
async fn missing_token_is_unauthorized() {
    let service = test_service();

    let mut res = TestClient::get(url("/auth/me")).send(&service).await;

    assert_eq!(res.status_code(), Some(StatusCode::UNAUTHORIZED));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body["error"], json!({"Unauthorized": "TokenNotPresent"}));
}

#[tokio::test]
#[serial]
async fn non_bearer_scheme_is_unauthorized() {
    let service = test_service();

    let mut res = TestClient::get(url("/videos"))
        .add_header("authorization", "Basic dXNlcjpwYXNz", true)
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::UNAUTHORIZED));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body["error"], json!({"Unauthorized": "MalformattedToken"}));
}

#[tokio::test]
#[serial]
async fn forged_token_is_unauthorized() {
    let service = test_service();

    let mut res = TestClient::get(url("/payments/subscription-status"))
        .add_header("authorization", "Bearer not.a.jwt", true)
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::UNAUTHORIZED));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body["error"], json!({"Unauthorized": "InvalidToken"}));
}

#[tokio::test]
#[serial]
async fn unsigned_webhook_is_rejected() {
    let service = test_service();

    let res = TestClient::post(url("/payments/webhook"))
        .raw_json(r#"{"type": "invoice.paid", "data": {"object": {}}}"#)
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
#[serial]
async fn badly_signed_webhook_is_rejected() {
    let service = test_service();

    let res = TestClient::post(url("/payments/webhook"))
        .add_header("stripe-signature", "t=1,v1=00ff", true)
        .raw_json(r#"{"type": "invoice.paid", "data": {"object": {}}}"#)
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
#[serial]
async fn non_uuid_ids_do_not_route() {
    let service = test_service();

    let res = TestClient::get(url("/videos/123"))
        .add_header("authorization", "Bearer token", true)
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::NOT_FOUND));
}

/// Delivers a signed webhook event, returning the response status and body.
async fn deliver(event: Value) -> (Option<StatusCode>, Value) {
    let service = test_service();
    let payload = event.to_string();

    let mut res = TestClient::post(url("/payments/webhook"))
        .add_header("stripe-signature", webhook_signature(&payload), true)
        .raw_json(payload)
        .send(&service)
        .await;

    (res.status_code(), res.take_json().await.unwrap())
}

#[tokio::test]
#[serial]
async fn unpaid_checkout_is_acknowledged_without_credit() {
    let (status, body) = deliver(json!({
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_1",
            "payment_status": "unpaid",
            "customer_email": "a@b.com"
        }}
    }))
    .await;

    assert_eq!(status, Some(StatusCode::OK));
    assert_eq!(body, json!({"status": "success"}));
}

#[tokio::test]
#[serial]
async fn paid_checkout_without_session_is_acknowledged() {
    let (status, body) = deliver(json!({
        "type": "checkout.session.completed",
        "data": {"object": {"payment_status": "paid", "customer_email": "a@b.com"}}
    }))
    .await;

    assert_eq!(status, Some(StatusCode::OK));
    assert_eq!(body, json!({"status": "success"}));
}

#[tokio::test]
#[serial]
async fn first_subscription_invoice_is_acknowledged_without_credit() {
    let (status, body) = deliver(json!({
        "type": "invoice.paid",
        "data": {"object": {
            "billing_reason": "subscription_create",
            "customer_email": "a@b.com",
            "lines": {"data": [{"price": {"id": "price_premium"}}]}
        }}
    }))
    .await;

    assert_eq!(status, Some(StatusCode::OK));
    assert_eq!(body, json!({"status": "success"}));
}

#[tokio::test]
#[serial]
async fn renewal_with_unknown_price_is_acknowledged() {
    let (status, body) = deliver(json!({
        "type": "invoice.paid",
        "data": {"object": {
            "billing_reason": "subscription_cycle",
            "customer_email": "a@b.com",
            "lines": {"data": [{"price": {"id": "price_not_sold"}}]}
        }}
    }))
    .await;

    assert_eq!(status, Some(StatusCode::OK));
    assert_eq!(body, json!({"status": "success"}));
}

#[tokio::test]
#[serial]
async fn failed_payment_and_other_events_are_acknowledged() {
    for event_type in ["invoice.payment_failed", "customer.created"] {
        let (status, body) = deliver(json!({
            "type": event_type,
            "data": {"object": {"id": "in_1", "customer": "cus_1"}}
        }))
        .await;

        assert_eq!(status, Some(StatusCode::OK));
        assert_eq!(body, json!({"status": "success"}));
    }
}

#[tokio::test]
#[serial]
async fn upload_requires_a_token() {
    let service = test_service();

    let mut res = TestClient::post(url("/uploads/video"))
        .add_header("content-type", "multipart/form-data; boundary=X", true)
        .body("--X--\r\n")
        .send(&service)
        .await;

    assert_eq!(res.status_code(), Some(StatusCode::UNAUTHORIZED));
    let body: Value = res.take_json().await.unwrap();
    assert_eq!(body["error"], json!({"Unauthorized": "TokenNotPresent"}));
}
