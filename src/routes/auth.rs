// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Account authentication routes.
//!
//! Links opened from emails land on the GET endpoints, which redirect to the
//! web client with a `status` the client switches on. Everything else is
//! JSON in, JSON out.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::AccountView;
use crate::services::{
    AuthSession, EmailVerification, GoogleProfile, OidcError, ResetTokenCheck,
};
use crate::AppState;

const REGISTERED_MESSAGE: &str =
    "Registration successful. Please check your email to verify your account.";
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";
const PASSWORD_CHANGED_MESSAGE: &str =
    "Password reset successful. You can now log in with your new password.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-email", get(verify_email))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_sign_in))
        .route("/auth/forgot-password", post(forgot_password))
        .route(
            "/auth/reset-password",
            get(check_reset_link).post(reset_password),
        )
}

/// Routes that need a session. The auth middleware is applied in
/// routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/me", get(me))
}

// ─── Response Bodies ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: AccountView,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            success: true,
            token: session.token,
            user: session.account,
        }
    }
}

// ─── Registration & Login ────────────────────────────────────

/// Email and password pair. Missing fields are reported by the service,
/// not by JSON extraction.
#[derive(Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsBody>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state
        .auth
        .register(
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((StatusCode::CREATED, MessageResponse::ok(REGISTERED_MESSAGE)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<SessionResponse>> {
    let session = state
        .auth
        .login(
            body.email.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(session.into()))
}

// ─── Email Verification ──────────────────────────────────────

#[derive(Deserialize)]
pub struct TokenParams {
    #[serde(default)]
    token: Option<String>,
}

/// Follow the link from a verification email, then hand off to the client.
async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
) -> Redirect {
    let client_url = &state.config.client_url;

    let (status, token, message) = match state.auth.verify_email_token(params.token.as_deref()).await
    {
        Ok(EmailVerification::Verified { token }) => {
            ("success", Some(token), "Email verified successfully.")
        }
        Ok(EmailVerification::AlreadyVerified { token }) => {
            ("already-verified", Some(token), "Email already verified.")
        }
        Ok(EmailVerification::Expired) => (
            "expired",
            None,
            "Verification link has expired. Please log in to receive a new one.",
        ),
        Ok(EmailVerification::Invalid(reason)) => ("invalid", None, reason),
        Err(e) => {
            tracing::error!(error = %e, "Email verification failed");
            ("error", None, "Something went wrong. Please try again later.")
        }
    };

    Redirect::temporary(&client_redirect(
        client_url,
        "verify-email",
        status,
        token.as_deref(),
        message,
    ))
}

// ─── Google Sign-In ──────────────────────────────────────────

/// Either a Google ID token (`credential`) or a profile the client already
/// decoded. The profile fields are only honored when no Google client ID is
/// configured.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInBody {
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    google_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleSignInBody>,
) -> Result<Json<SessionResponse>> {
    let profile = match &state.google_verifier {
        Some(verifier) => {
            let credential = body
                .credential
                .filter(|c| !c.trim().is_empty())
                .ok_or(AppError::MissingFields("Google credential is required."))?;

            let identity = verifier.verify(credential.trim()).await.map_err(|e| {
                tracing::warn!(error = %e, "Google credential verification failed");
                match e {
                    OidcError::Rejected(_) => AppError::InvalidToken("Invalid Google credential."),
                    OidcError::Transient(msg) => {
                        AppError::Internal(anyhow::anyhow!("Google key lookup failed: {}", msg))
                    }
                }
            })?;

            GoogleProfile {
                google_id: identity.subject,
                email: identity.email,
                name: identity.name,
                picture: identity.picture,
            }
        }
        None => GoogleProfile {
            google_id: body.google_id.unwrap_or_default(),
            email: body.email.unwrap_or_default(),
            name: body.name,
            picture: body.picture,
        },
    };

    let session = state.auth.link_or_create_google_account(profile).await?;
    Ok(Json(session.into()))
}

// ─── Password Reset ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct ForgotPasswordBody {
    #[serde(default)]
    email: Option<String>,
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordBody>,
) -> Result<Json<MessageResponse>> {
    state
        .auth
        .request_password_reset(body.email.as_deref().unwrap_or_default())
        .await?;

    Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE))
}

/// Follow the link from a reset email, then hand off to the client's
/// new-password form.
async fn check_reset_link(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenParams>,
) -> Redirect {
    let (status, token, message) = match state.auth.check_reset_token(params.token.as_deref()) {
        ResetTokenCheck::Valid { token } => {
            ("success", Some(token), "Please enter your new password.")
        }
        ResetTokenCheck::Expired => (
            "expired",
            None,
            "This reset link has expired. Please request a new one.",
        ),
        ResetTokenCheck::Invalid(reason) => ("invalid", None, reason),
    };

    Redirect::temporary(&client_redirect(
        &state.config.client_url,
        "reset-password",
        status,
        token.as_deref(),
        message,
    ))
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Json<MessageResponse>> {
    state
        .auth
        .reset_password(
            body.token.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(MessageResponse::ok(PASSWORD_CHANGED_MESSAGE))
}

// ─── Current Account ─────────────────────────────────────────

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AccountView>> {
    Ok(Json(state.auth.current_account(&user.account_id).await?))
}

/// Build `{client_url}/{page}?status=..[&token=..]&message=..`.
fn client_redirect(
    client_url: &str,
    page: &str,
    status: &str,
    token: Option<&str>,
    message: &str,
) -> String {
    let mut url = format!("{}/{}?status={}", client_url, page, status);
    if let Some(token) = token {
        url.push_str("&token=");
        url.push_str(&urlencoding::encode(token));
    }
    url.push_str("&message=");
    url.push_str(&urlencoding::encode(message));
    url
}
