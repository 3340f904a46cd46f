//! Phone OTP and Google sign-in through the HTTP surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use erthaloka::testing::{TestContext, TEST_GOOGLE_TOKEN};

async fn post(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn extract_code(message: &str) -> String {
    message
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take(6)
        .collect()
}

#[tokio::test]
async fn test_otp_login_creates_account_with_bonus() {
    let test = TestContext::new();

    let (status, _) = post(
        test.router(),
        "/api/auth/otp/request",
        json!({ "phone": "+91 98765 43210" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = test.sms.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+919876543210");
    let code = extract_code(&sent[0].1);

    let (status, body) = post(
        test.router(),
        "/api/auth/otp/verify",
        json!({ "phone": "+919876543210", "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["account"]["phone"], "+919876543210");
    assert_eq!(body["data"]["account"]["coin_balance"], 50);
    assert!(body["data"]["token"]["token"].as_str().is_some());

    // Reusing the consumed code fails.
    let (status, _) = post(
        test.router(),
        "/api/auth/otp/verify",
        json!({ "phone": "+919876543210", "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_otp_rejects_invalid_phone() {
    let test = TestContext::new();
    let (status, body) = post(
        test.router(),
        "/api/auth/otp/request",
        json!({ "phone": "12345" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid phone number");
    assert!(test.sms.sent().is_empty());
}

#[tokio::test]
async fn test_google_sign_in() {
    let test = TestContext::new();

    let (status, body) = post(
        test.router(),
        "/api/auth/google",
        json!({ "id_token": TEST_GOOGLE_TOKEN }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first_id = body["data"]["account"]["id"].as_str().unwrap().to_string();

    // Same Google subject resolves to the same account.
    let (_, body) = post(
        test.router(),
        "/api/auth/google",
        json!({ "id_token": TEST_GOOGLE_TOKEN }),
    )
    .await;
    assert_eq!(body["data"]["account"]["id"].as_str().unwrap(), first_id);

    let (status, _) = post(
        test.router(),
        "/api/auth/google",
        json!({ "id_token": "forged-token" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
