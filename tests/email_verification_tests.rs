// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Email verification link tests.
//!
//! The GET endpoint always redirects to the web client; the outcome is
//! carried in the `status` query parameter.

use axum::http::StatusCode;
use tower::ServiceExt;
use voyage_auth::db::AccountStore;
use voyage_auth::models::Account;

mod common;
use common::{create_test_app, expired_token, get, location, path_and_query, query_param};

const API_URL: &str = "http://localhost:3001";
const VERIFY_PAGE: &str = "http://localhost:5173/verify-email?";

#[tokio::test]
async fn test_verification_link_verifies_account() {
    let (app, ctx) = create_test_app();
    ctx.state
        .auth
        .register("a@example.com", "secret1")
        .await
        .unwrap();

    let link = ctx.notifier.last().unwrap().link;
    let response = app
        .clone()
        .oneshot(get(&path_and_query(&link, API_URL)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let target = location(&response);
    assert!(target.starts_with(VERIFY_PAGE), "{target}");
    assert_eq!(query_param(&target, "status").as_deref(), Some("success"));

    // The redirect carries a fresh login token for the same account.
    let session = query_param(&target, "token").expect("login token");
    let claims = ctx.state.auth.tokens().decode(&session).unwrap();
    let account = ctx
        .store
        .find_by_email("a@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claims.account_id.as_deref(), Some(account.id.as_str()));
    assert!(account.is_email_verified);

    // Following the same link again is harmless.
    let response = app
        .oneshot(get(&path_and_query(&link, API_URL)))
        .await
        .unwrap();
    let target = location(&response);
    assert_eq!(
        query_param(&target, "status").as_deref(),
        Some("already-verified")
    );
    assert!(query_param(&target, "token").is_some());
    assert!(ctx
        .store
        .find_by_id(&account.id)
        .await
        .unwrap()
        .unwrap()
        .is_email_verified);
}

#[tokio::test]
async fn test_verification_without_token_is_invalid() {
    let (app, _ctx) = create_test_app();

    for uri in ["/auth/verify-email", "/auth/verify-email?token="] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let target = location(&response);
        assert_eq!(query_param(&target, "status").as_deref(), Some("invalid"));
        assert!(query_param(&target, "token").is_none());
    }
}

#[tokio::test]
async fn test_verification_with_garbage_token_is_invalid() {
    let (app, _ctx) = create_test_app();

    let response = app
        .oneshot(get("/auth/verify-email?token=not.a.jwt"))
        .await
        .unwrap();

    let target = location(&response);
    assert_eq!(query_param(&target, "status").as_deref(), Some("invalid"));
}

#[tokio::test]
async fn test_verification_with_expired_token() {
    let (app, ctx) = create_test_app();
    let account = Account::new("late@example.com");
    ctx.store.create(&account).await.unwrap();

    let token = expired_token(&account.id, None);
    let response = app
        .oneshot(get(&format!("/auth/verify-email?token={token}")))
        .await
        .unwrap();

    let target = location(&response);
    assert_eq!(query_param(&target, "status").as_deref(), Some("expired"));
    assert!(!ctx
        .store
        .find_by_id(&account.id)
        .await
        .unwrap()
        .unwrap()
        .is_email_verified);
}

#[tokio::test]
async fn test_verification_for_missing_account() {
    let (app, ctx) = create_test_app();
    let token = ctx
        .state
        .auth
        .tokens()
        .issue(
            &voyage_auth::services::token::TokenPayload::login("no-such-id", "ghost@example.com"),
            voyage_auth::services::token::LOGIN_TOKEN_TTL,
        )
        .unwrap();

    let response = app
        .oneshot(get(&format!("/auth/verify-email?token={token}")))
        .await
        .unwrap();

    let target = location(&response);
    assert_eq!(query_param(&target, "status").as_deref(), Some("invalid"));
    assert_eq!(
        query_param(&target, "message").as_deref(),
        Some("User does not exist.")
    );
}

#[tokio::test]
async fn test_verification_store_outage_redirects_with_error() {
    use std::sync::Arc;
    use voyage_auth::config::Config;
    use voyage_auth::db::FirestoreDb;
    use voyage_auth::routes::create_router;
    use voyage_auth::services::token::{TokenPayload, LOGIN_TOKEN_TTL};
    use voyage_auth::services::{AuthService, MemoryNotifier};
    use voyage_auth::AppState;

    let config = Config::test_default();
    let auth = AuthService::new(
        &config,
        Arc::new(FirestoreDb::new_mock()),
        Arc::new(MemoryNotifier::new()),
    )
    .unwrap();
    let token = auth
        .tokens()
        .issue(&TokenPayload::login("acct-1", "a@example.com"), LOGIN_TOKEN_TTL)
        .unwrap();
    let app = create_router(Arc::new(AppState {
        config,
        auth,
        google_verifier: None,
    }));

    let response = app
        .oneshot(get(&format!("/auth/verify-email?token={token}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let target = location(&response);
    assert_eq!(query_param(&target, "status").as_deref(), Some("error"));
    assert!(!target.contains("offline"));
}
