//! Router tests driving the full app against the in-memory store.

use super::{router, AppState};
use crate::{
    account::{
        tests::{secret, test_policy},
        Account,
    },
    config::Config,
    storage::{AccountStore, MemoryStore},
};
use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN_HEADER: &str = "x-jwt-token";

fn app_state() -> Result<Arc<AppState>> {
    let config = Config::new(Some(secret("router-test-secret")))?.with_account_policy(test_policy())?;
    Ok(Arc::new(AppState::new(&config, Arc::new(MemoryStore::new()))))
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((status, value))
}

fn json_request(method: Method, uri: &str, body: &Value, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token);
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(TOKEN_HEADER, token);
    }
    Ok(builder.body(Body::empty())?)
}

async fn create(app: &Router, first: &str, last: &str, password: &str) -> Result<Value> {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/accounts",
            &json!({"firstName": first, "lastName": last, "password": password}),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    Ok(body)
}

async fn login(app: &Router, number: &Value, password: &str) -> Result<(StatusCode, Value)> {
    send(
        app,
        json_request(
            Method::POST,
            "/login",
            &json!({"number": number, "password": password}),
            None,
        )?,
    )
    .await
}

#[tokio::test]
async fn test_create_login_and_read_own_account() -> Result<()> {
    let app = router(app_state()?);

    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;
    assert_eq!(ada["firstName"], "Ada");
    assert_eq!(ada["lastName"], "Lovelace");
    assert_eq!(ada["balance"], 0);
    assert!(ada.get("encryptedPassword").is_none());
    assert!(ada.get("password").is_none());

    let (status, session) = login(&app, &ada["number"], "Str0ng#Pass").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["number"], ada["number"]);
    let token = session["token"].as_str().unwrap_or_default().to_string();
    assert!(!token.is_empty());

    let uri = format!("/accounts/{}", ada["id"]);
    let (status, body) = send(&app, empty_request(Method::GET, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], ada["number"]);
    assert_eq!(body["id"], ada["id"]);
    Ok(())
}

#[tokio::test]
async fn test_padded_id_resolves_like_the_gate() -> Result<()> {
    let app = router(app_state()?);

    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;
    let (_, session) = login(&app, &ada["number"], "Str0ng#Pass").await?;
    let token = session["token"].as_str().unwrap_or_default().to_string();

    let uri = format!("/accounts/%20{}", ada["id"]);
    let (status, body) = send(&app, empty_request(Method::GET, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], ada["number"]);

    let (status, body) = send(&app, empty_request(Method::DELETE, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": ada["id"]}));
    Ok(())
}

#[tokio::test]
async fn test_token_does_not_open_other_accounts() -> Result<()> {
    let app = router(app_state()?);

    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;
    let grace = create(&app, "Grace", "Hopper", "C0bol#Rules").await?;

    let (_, session) = login(&app, &ada["number"], "Str0ng#Pass").await?;
    let token = session["token"].as_str().unwrap_or_default().to_string();

    let uri = format!("/accounts/{}", grace["id"]);
    let (status, body) = send(&app, empty_request(Method::GET, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"error": "permission denied"}));

    let (status, _) = send(&app, empty_request(Method::DELETE, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_protected_routes_need_a_token() -> Result<()> {
    let app = router(app_state()?);
    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;
    let uri = format!("/accounts/{}", ada["id"]);

    let (status, _) = send(&app, empty_request(Method::GET, &uri, None)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, empty_request(Method::GET, &uri, Some("not-a-jwt"))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, empty_request(Method::GET, "/accounts/abc", None)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_login_failures_look_the_same() -> Result<()> {
    let app = router(app_state()?);
    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;

    let (status, wrong_password) = login(&app, &ada["number"], "Wr0ng#Pass").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unknown_number) = login(&app, &json!(1), "Str0ng#Pass").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(wrong_password, json!({"error": "not authenticated"}));
    assert_eq!(wrong_password, unknown_number);
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_bad_input() -> Result<()> {
    let app = router(app_state()?);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/accounts",
            &json!({"firstName": "Ada", "lastName": "Lovelace", "password": "short"}),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/accounts",
            &json!({"firstName": "  ", "lastName": "Lovelace", "password": "Str0ng#Pass"}),
            None,
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(Method::POST, "/accounts", &json!({"firstName": "Ada"}), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, accounts) = send(&app, empty_request(Method::GET, "/accounts", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accounts, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_list_and_delete() -> Result<()> {
    let app = router(app_state()?);
    let ada = create(&app, "Ada", "Lovelace", "Str0ng#Pass").await?;
    create(&app, "Grace", "Hopper", "C0bol#Rules").await?;

    let (status, accounts) = send(&app, empty_request(Method::GET, "/accounts", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accounts.as_array().map(Vec::len), Some(2));

    let (_, session) = login(&app, &ada["number"], "Str0ng#Pass").await?;
    let token = session["token"].as_str().unwrap_or_default().to_string();
    let uri = format!("/accounts/{}", ada["id"]);

    let (status, body) = send(&app, empty_request(Method::DELETE, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": ada["id"]}));

    // The owner is gone, so the same token no longer resolves.
    let (status, _) = send(&app, empty_request(Method::GET, &uri, Some(&token))?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, accounts) = send(&app, empty_request(Method::GET, "/accounts", None)?).await?;
    assert_eq!(accounts.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_transfer() -> Result<()> {
    let state = app_state()?;
    let app = router(state.clone());

    let account = Account::new("Ada", "Lovelace", &secret("Str0ng#Pass"), &test_policy())?;
    let account = state.store().create_account(&account).await?;
    let token = state.tokens().issue_token(&account)?;

    let transfer = json!({"toAccount": 42, "amount": 1250});

    let (status, _) = send(&app, json_request(Method::POST, "/transfer", &transfer, None)?).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/transfer", &transfer, Some(&token))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, transfer);

    let bearer = format!("Bearer {token}");
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/transfer",
            &json!({"toAccount": 42, "amount": 0}),
            Some(&bearer),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "amount must be positive"}));
    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let app = router(app_state()?);

    let response = app
        .clone()
        .oneshot(empty_request(Method::GET, "/health", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let health: Value = serde_json::from_slice(&body)?;
    assert_eq!(health["database"], "ok");
    assert_eq!(health["name"], env!("CARGO_PKG_NAME"));

    let response = app
        .oneshot(empty_request(Method::HEAD, "/health", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    assert!(body.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_request_id_is_propagated() -> Result<()> {
    let app = router(app_state()?);

    let request = Request::builder()
        .uri("/accounts")
        .header("x-request-id", "01J0000000000000000000TEST")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("01J0000000000000000000TEST")
    );
    Ok(())
}

#[tokio::test]
async fn test_openapi_document_is_served() -> Result<()> {
    let app = router(app_state()?);

    let (status, doc) = send(&app, empty_request(Method::GET, "/api-docs/openapi.json", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/login"].is_object());
    Ok(())
}
