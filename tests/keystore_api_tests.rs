//! 密钥库 API 测试

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use tower::ServiceExt;
use upalcore::{
    api,
    app_state::AppState,
    infrastructure::jwt::JwtKeys,
    repository::{InMemoryKeystoreRepository, KeystoreRepository},
};

const SECRET: &str = "test_secret_that_is_at_least_32_characters_long";

struct TestApp {
    router: Router,
    jwt: JwtKeys,
    repo: InMemoryKeystoreRepository,
}

fn app() -> TestApp {
    let jwt = JwtKeys::from_secret(SECRET).unwrap();
    let repo = InMemoryKeystoreRepository::new();
    let state = Arc::new(AppState::new(Arc::new(repo.clone()), jwt.clone()));
    TestApp {
        router: api::routes(state),
        jwt,
        repo,
    }
}

fn bearer(jwt: &JwtKeys, account: &str) -> String {
    format!("Bearer {}", jwt.generate_token(account, 3600).unwrap())
}

fn post(auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/keystore")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/keystore");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_store_then_fetch() {
    let app = app();
    let auth = bearer(&app.jwt, "account-1");

    let response = app
        .router
        .clone()
        .oneshot(post(
            Some(&auth),
            json!({ "encryptedKeystore": "{\"version\":1}", "walletAddress": TEST_ADDRESS }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));
    let body = json_body(response).await;
    assert_eq!(body["walletAddress"], TEST_ADDRESS);
    assert_eq!(body["version"], 1);

    let response = app.router.clone().oneshot(get(Some(&auth))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["encryptedKeystore"], "{\"version\":1}");
    assert_eq!(body["walletAddress"], TEST_ADDRESS);
    assert_eq!(body["hasWallet"], true);
}

#[tokio::test]
async fn test_overwrite_bumps_version() {
    let app = app();
    let auth = bearer(&app.jwt, "account-2");

    for blob in ["first", "second"] {
        let response = app
            .router
            .clone()
            .oneshot(post(
                Some(&auth),
                json!({ "encryptedKeystore": blob, "walletAddress": RECIPIENT }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let stored = app.repo.get("account-2").await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.keystore.encrypted_blob, "second");
}

#[tokio::test]
async fn test_accounts_are_isolated() {
    let app = app();
    let alice = bearer(&app.jwt, "alice");
    let bob = bearer(&app.jwt, "bob");

    app.router
        .clone()
        .oneshot(post(
            Some(&alice),
            json!({ "encryptedKeystore": "blob", "walletAddress": RECIPIENT }),
        ))
        .await
        .unwrap();

    let response = app.router.clone().oneshot(get(Some(&bob))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["code"], "keystore_not_found");
    assert_eq!(body["message"], "No keystore found");
}

#[tokio::test]
async fn test_missing_or_invalid_token() {
    let app = app();

    let response = app.router.clone().oneshot(get(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(get(Some("Bearer not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let other = JwtKeys::from_secret("another_secret_that_is_also_32_chars_long").unwrap();
    let response = app
        .router
        .clone()
        .oneshot(get(Some(&bearer(&other, "account-1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(post(
            Some("Basic dXNlcjpwYXNz"),
            json!({ "encryptedKeystore": "blob", "walletAddress": RECIPIENT }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_requests() {
    let app = app();
    let auth = bearer(&app.jwt, "account-3");

    for body in [
        json!({ "walletAddress": RECIPIENT }),
        json!({ "encryptedKeystore": "blob" }),
        json!({ "encryptedKeystore": "  ", "walletAddress": RECIPIENT }),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(post(Some(&auth), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .router
        .clone()
        .oneshot(post(
            Some(&auth),
            json!({ "encryptedKeystore": "blob", "walletAddress": "0x1234" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "invalid_address");

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/keystore")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.repo.get("account-3").await.unwrap().is_none());
}

#[tokio::test]
async fn test_healthz_needs_no_token() {
    let app = app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_for_configured_origin() {
    let app = app();
    let router = app
        .router
        .layer(api::cors_layer("https://upal.example.com").unwrap());

    let response = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/keystore")
                .header(header::ORIGIN, "https://upal.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://upal.example.com"
    );
}
