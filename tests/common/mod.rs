// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;
use voyage_auth::config::Config;
use voyage_auth::db::{
    AccountStore, AccountTransaction, FirestoreDb, MemoryAccountStore, StoreError,
};
use voyage_auth::models::{Account, AccountChanges};
use voyage_auth::routes::create_router;
use voyage_auth::services::{AuthService, GoogleIdTokenVerifier, MemoryNotifier};
use voyage_auth::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Handles on the test doubles behind a test app.
#[allow(dead_code)]
pub struct TestContext {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryAccountStore>,
    pub notifier: Arc<MemoryNotifier>,
}

/// Build app state over an in-memory store and notifier.
#[allow(dead_code)]
pub fn test_state(
    config: Config,
    google_verifier: Option<Arc<GoogleIdTokenVerifier>>,
) -> TestContext {
    let store = Arc::new(MemoryAccountStore::new());
    let notifier = Arc::new(MemoryNotifier::new());

    let auth = AuthService::new(
        &config,
        store.clone() as Arc<dyn AccountStore>,
        notifier.clone(),
    )
    .expect("Failed to build auth service");

    let state = Arc::new(AppState {
        config,
        auth,
        google_verifier,
    });

    TestContext {
        state,
        store,
        notifier,
    }
}

/// Create a test app with in-memory dependencies.
/// Returns the router and the handles for inspecting side effects.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, TestContext) {
    let ctx = test_state(Config::test_default(), None);
    (create_router(ctx.state.clone()), ctx)
}

/// Create a test app that checks Google credentials with `verifier`.
#[allow(dead_code)]
pub fn create_test_app_with_google(
    verifier: GoogleIdTokenVerifier,
) -> (axum::Router, TestContext) {
    let ctx = test_state(Config::test_default(), Some(Arc::new(verifier)));
    (create_router(ctx.state.clone()), ctx)
}

/// In-memory store that can hold `find_by_email` callers right after their
/// read, to line up concurrent operations on the same account.
#[allow(dead_code)]
#[derive(Default)]
pub struct GatedStore {
    pub inner: MemoryAccountStore,
    gate: Mutex<Option<Arc<Barrier>>>,
}

#[allow(dead_code)]
impl GatedStore {
    /// Hold email lookups until `parties` callers have arrived, then hold
    /// them again until `parties` callers pass a second time. The returned
    /// barrier lets the test be one of the parties.
    pub fn hold_email_lookups(&self, parties: usize) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(parties));
        *self.gate.lock().unwrap() = Some(barrier.clone());
        barrier
    }

    pub fn open(&self) {
        *self.gate.lock().unwrap() = None;
    }
}

#[async_trait]
impl AccountStore for GatedStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let result = self.inner.find_by_email(email).await;
        let gate = self.gate.lock().unwrap().clone();
        if let Some(barrier) = gate {
            barrier.wait().await;
            barrier.wait().await;
        }
        result
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn exists(&self, email: &str) -> Result<bool, StoreError> {
        self.inner.exists(email).await
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        self.inner.create(account).await
    }

    async fn update(
        &self,
        id: &str,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        self.inner.update(id, changes).await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn AccountTransaction + 'a>, StoreError> {
        self.inner.begin().await
    }
}

/// Auth service over a [`GatedStore`].
#[allow(dead_code)]
pub fn gated_auth() -> (Arc<AuthService>, Arc<GatedStore>, Arc<MemoryNotifier>) {
    let store = Arc::new(GatedStore::default());
    let notifier = Arc::new(MemoryNotifier::new());
    let auth = AuthService::new(
        &Config::test_default(),
        store.clone() as Arc<dyn AccountStore>,
        notifier.clone(),
    )
    .expect("Failed to build auth service");
    (Arc::new(auth), store, notifier)
}

/// Build a JSON POST request.
#[allow(dead_code)]
pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Location header of a redirect response.
#[allow(dead_code)]
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Value of a query parameter in a URL, percent-decoded.
#[allow(dead_code)]
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

/// Path part of a link, used to replay emailed links against the router.
#[allow(dead_code)]
pub fn path_and_query(link: &str, base: &str) -> String {
    link.strip_prefix(base).unwrap_or(link).to_string()
}

/// Sign a token that expired an hour ago with the test key.
#[allow(dead_code)]
pub fn expired_token(account_id: &str, purpose: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut claims = serde_json::json!({
        "userId": account_id,
        "iat": now - 7200,
        "exp": now - 3600,
    });
    if let Some(purpose) = purpose {
        claims["type"] = serde_json::Value::from(purpose);
    }

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&Config::test_default().jwt_signing_key),
    )
    .unwrap()
}

/// Register an account and follow its verification link.
/// Returns the account ID.
#[allow(dead_code)]
pub async fn register_verified(ctx: &TestContext, email: &str, password: &str) -> String {
    use voyage_auth::services::EmailVerification;

    ctx.state.auth.register(email, password).await.unwrap();
    let link = ctx.notifier.last().expect("verification email");
    let outcome = ctx
        .state
        .auth
        .verify_email_token(link.token())
        .await
        .unwrap();
    assert!(matches!(outcome, EmailVerification::Verified { .. }));

    let claims = ctx.state.auth.tokens().decode(link.token().unwrap()).unwrap();
    claims.account_id.unwrap()
}
