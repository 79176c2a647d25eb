// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Credential and token lifecycle: registration, email verification, login,
//! Google account linking and password reset.
//!
//! Per account, verification only ever moves forward:
//! `unverified -> verified` through an emailed link, a Google sign-in or a
//! completed password reset. A login attempt on an unverified account
//! re-sends the verification link and leaves the state unchanged.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{AccountStore, AccountTransaction, StoreError};
use crate::error::{AppError, Result};
use crate::models::{Account, AccountChanges, AccountView, AuthProvider};
use crate::services::notifier::Notifier;
use crate::services::password::{
    hash_password, hash_password_blocking, validate_password, verify_password,
};
use crate::services::token::{
    TokenCodec, TokenError, TokenPayload, LOGIN_TOKEN_TTL, PASSWORD_RESET_TTL,
    VERIFICATION_RESEND_TTL,
};
use crate::validation::{is_valid_email, normalize_email};

const EMAIL_AND_PASSWORD_REQUIRED: &str = "Email and password are required.";
const INVALID_TOKEN: &str = "Invalid token.";
const ACCOUNT_NOT_FOUND: &str = "User does not exist.";
const WRONG_TOKEN_PURPOSE: &str = "This token cannot be used to reset a password.";

/// Burned on logins for unknown emails so they take as long as a wrong password.
const DUMMY_PASSWORD: &str = "voyage-auth-timing-equalizer";

/// A signed-in session handed back to the client.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub account: AccountView,
}

/// Outcome of following an email verification link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailVerification {
    Verified { token: String },
    AlreadyVerified { token: String },
    Expired,
    Invalid(&'static str),
}

/// Outcome of checking a password reset link before showing the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTokenCheck {
    Valid { token: String },
    Expired,
    Invalid(&'static str),
}

/// Identity asserted by Google for sign-in.
#[derive(Debug, Clone, Default)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Owns the account lifecycle rules on top of the account directory,
/// the token codec and the notifier.
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenCodec,
    api_url: String,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        config: &Config,
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            notifier,
            tokens: TokenCodec::new(&config.jwt_signing_key),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            dummy_hash: hash_password_blocking(DUMMY_PASSWORD)?,
        })
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    fn verify_link(&self, token: &str) -> String {
        format!("{}/auth/verify-email?token={}", self.api_url, token)
    }

    fn reset_link(&self, token: &str) -> String {
        format!("{}/auth/reset-password?token={}", self.api_url, token)
    }

    fn login_token(&self, account: &Account) -> Result<String> {
        Ok(self.tokens.issue(
            &TokenPayload::login(&account.id, &account.email),
            LOGIN_TOKEN_TTL,
        )?)
    }

    // ─── Registration ────────────────────────────────────────────

    /// Create a local account and send its verification link.
    ///
    /// The account write and the email are one unit: if the email cannot be
    /// sent the account is never committed.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        tracing::info!(email, "Registration attempt");

        let (email, password) = credentials(email, password)
            .inspect_err(|e| tracing::warn!(email, code = e.code(), "Registration rejected"))?;

        validate_password(&password).map_err(|reason| {
            tracing::warn!(email = %email, "Registration rejected - weak password");
            AppError::WeakPassword(reason)
        })?;

        if self.store.exists(&email).await? {
            tracing::warn!(email = %email, "Registration rejected - account exists");
            return Err(AppError::AccountExists);
        }

        let mut account = Account::new(&email);
        account.password_hash = Some(hash_password(password).await?);
        account.add_provider(AuthProvider::Local);

        let mut tx = self.store.begin().await?;
        if let Err(e) = self.stage_registration(tx.as_mut(), &account).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Registration rollback failed");
            }
            return Err(e);
        }

        tx.commit().await.map_err(|e| registration_conflict(e, &email))?;

        tracing::info!(account_id = %account.id, email = %email, "Account registered");
        Ok(())
    }

    async fn stage_registration(
        &self,
        tx: &mut (dyn AccountTransaction + '_),
        account: &Account,
    ) -> Result<()> {
        // Claims the email first, so a registration that lost a race never
        // sends a link.
        tx.create(account)
            .await
            .map_err(|e| registration_conflict(e, &account.email))?;

        let token = self.login_token(account)?;
        self.notifier
            .send_verification(&account.email, &self.verify_link(&token))
            .await
            .map_err(|e| {
                tracing::error!(
                    account_id = %account.id,
                    error = %e,
                    "Verification email failed, aborting registration"
                );
                AppError::Internal(e.into())
            })?;

        tracing::info!(account_id = %account.id, "Verification email sent");
        Ok(())
    }

    // ─── Email Verification ──────────────────────────────────────

    /// Consume a verification link. Safe to repeat.
    pub async fn verify_email_token(&self, token: Option<&str>) -> Result<EmailVerification> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            tracing::warn!("Email verification failed - missing token");
            return Ok(EmailVerification::Invalid(INVALID_TOKEN));
        };

        let claims = match self.tokens.decode(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                tracing::warn!("Email verification failed - token expired");
                return Ok(EmailVerification::Expired);
            }
            Err(TokenError::Invalid(reason)) => {
                tracing::warn!(reason = %reason, "Email verification failed - invalid token");
                return Ok(EmailVerification::Invalid(INVALID_TOKEN));
            }
        };

        let Some(account_id) = claims.account_id else {
            tracing::warn!("Email verification failed - token has no account");
            return Ok(EmailVerification::Invalid(INVALID_TOKEN));
        };

        let not_found = || {
            tracing::warn!(account_id = %account_id, "Email verification failed - account not found");
            Ok(EmailVerification::Invalid(ACCOUNT_NOT_FOUND))
        };

        let Some(account) = self.store.find_by_id(&account_id).await? else {
            return not_found();
        };

        if account.is_email_verified {
            tracing::info!(account_id = %account.id, "Email already verified");
            let token = self.login_token(&account)?;
            return Ok(EmailVerification::AlreadyVerified { token });
        }

        // Following the link proves control of the address, which is all a
        // local login needs.
        let changes = AccountChanges {
            mark_verified: true,
            add_providers: vec![AuthProvider::Local],
            ..Default::default()
        };
        let Some(account) = self.store.update(&account_id, &changes).await? else {
            return not_found();
        };

        tracing::info!(account_id = %account.id, email = %account.email, "Email verified");

        let token = self.login_token(&account)?;
        Ok(EmailVerification::Verified { token })
    }

    // ─── Login ───────────────────────────────────────────────────

    /// Authenticate with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        tracing::info!(email, "Login attempt");

        let (email, password) = credentials(email, password)
            .inspect_err(|e| tracing::warn!(email, code = e.code(), "Login rejected"))?;

        let Some(account) = self.store.find_by_email(&email).await? else {
            let _ = verify_password(password, self.dummy_hash.clone()).await;
            tracing::warn!(email = %email, "Login failed - account not found");
            return Err(AppError::InvalidCredentials);
        };

        let Some(stored_hash) = account.password_hash.clone() else {
            tracing::warn!(
                account_id = %account.id,
                providers = ?account.auth_providers,
                "Login failed - no password set"
            );
            return Err(AppError::NoPasswordSet);
        };

        if !verify_password(password, stored_hash).await? {
            tracing::warn!(account_id = %account.id, "Login failed - incorrect password");
            return Err(AppError::InvalidCredentials);
        }

        if !account.is_email_verified {
            let resent = self.resend_verification(&account).await?;
            return Err(AppError::EmailNotVerified { resent });
        }

        let token = self.login_token(&account)?;
        tracing::info!(account_id = %account.id, "Login successful");

        Ok(AuthSession {
            token,
            account: account.view(),
        })
    }

    /// Send a short-lived verification link. Returns whether the send worked.
    async fn resend_verification(&self, account: &Account) -> Result<bool> {
        let token = self.tokens.issue(
            &TokenPayload::login(&account.id, &account.email),
            VERIFICATION_RESEND_TTL,
        )?;

        match self
            .notifier
            .send_verification(&account.email, &self.verify_link(&token))
            .await
        {
            Ok(()) => {
                tracing::info!(account_id = %account.id, "Verification email resent on login");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(
                    account_id = %account.id,
                    error = %e,
                    "Failed to resend verification email on login"
                );
                Ok(false)
            }
        }
    }

    // ─── Google Sign-In ──────────────────────────────────────────

    /// Sign in with a Google identity, creating or linking the account.
    pub async fn link_or_create_google_account(
        &self,
        profile: GoogleProfile,
    ) -> Result<AuthSession> {
        let google_id = profile.google_id.trim().to_string();
        tracing::info!(
            email = %profile.email,
            has_google_id = !google_id.is_empty(),
            "Google sign-in attempt"
        );

        let email = normalize_email(&profile.email)
            .filter(|_| !google_id.is_empty())
            .ok_or_else(|| {
                tracing::warn!("Google sign-in rejected - missing fields");
                AppError::MissingFields("Google ID and email are required.")
            })?;

        if !is_valid_email(&email) {
            tracing::warn!(email = %email, "Google sign-in rejected - invalid email");
            return Err(AppError::InvalidEmail);
        }

        let name = profile.name.filter(|n| !n.trim().is_empty());
        let picture = profile.picture.filter(|p| !p.trim().is_empty());

        let account = match self.store.find_by_email(&email).await? {
            None => {
                let mut account = Account::new(&email);
                account.google_id = Some(google_id);
                account.display_name = name;
                account.avatar_url = picture;
                account.mark_verified();
                account.add_provider(AuthProvider::Google);

                match self.store.create(&account).await {
                    Ok(()) => {}
                    Err(StoreError::DuplicateKey(_)) => {
                        tracing::warn!(email = %email, "Google sign-in lost creation race");
                        return Err(AppError::DuplicateAccount);
                    }
                    Err(e) => return Err(e.into()),
                }

                tracing::info!(account_id = %account.id, email = %email, "Account created via Google");
                account
            }
            Some(existing) => {
                let changes = google_link_changes(google_id, name, picture);
                // Persist only if the link changes something.
                let mut preview = existing.clone();
                if !changes.apply(&mut preview) {
                    existing
                } else {
                    let account = self
                        .store
                        .update(&existing.id, &changes)
                        .await?
                        .ok_or_else(|| {
                            tracing::warn!(account_id = %existing.id, "Google link failed - account deleted");
                            AppError::UserNotFound
                        })?;
                    tracing::info!(account_id = %account.id, "Google identity linked");
                    account
                }
            }
        };

        let token = self.login_token(&account)?;
        tracing::info!(account_id = %account.id, "Google sign-in successful");

        Ok(AuthSession {
            token,
            account: account.view(),
        })
    }

    // ─── Password Reset ──────────────────────────────────────────

    /// Email a password reset link if the account can use one.
    ///
    /// Once the email is well formed the result is always `Ok`: whether the
    /// account exists, has a password, or could be reached shows up only in
    /// the logs.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        tracing::info!(email, "Password reset request");

        let email = normalize_email(email).ok_or_else(|| {
            tracing::warn!("Password reset rejected - missing email");
            AppError::MissingFields("Email is required.")
        })?;

        if !is_valid_email(&email) {
            tracing::warn!(email = %email, "Password reset rejected - invalid email");
            return Err(AppError::InvalidEmail);
        }

        if let Err(e) = self.send_reset_link(&email).await {
            tracing::error!(email = %email, error = %e, "Password reset request failed");
        }

        Ok(())
    }

    async fn send_reset_link(&self, email: &str) -> Result<()> {
        let Some(account) = self.store.find_by_email(email).await? else {
            tracing::info!(email, "Password reset requested for unknown email");
            return Ok(());
        };

        if account.password_hash.is_none() {
            tracing::warn!(
                account_id = %account.id,
                providers = ?account.auth_providers,
                "Password reset requested for provider-only account"
            );
            return Ok(());
        }

        let token = self.tokens.issue(
            &TokenPayload::password_reset(&account.id, email),
            PASSWORD_RESET_TTL,
        )?;

        self.notifier
            .send_password_reset(email, &self.reset_link(&token))
            .await
            .map_err(|e| AppError::Internal(e.into()))?;

        tracing::info!(account_id = %account.id, "Password reset email sent");
        Ok(())
    }

    /// Check a reset link before the client shows the new-password form.
    /// Never mutates state.
    pub fn check_reset_token(&self, token: Option<&str>) -> ResetTokenCheck {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            tracing::warn!("Reset token check failed - missing token");
            return ResetTokenCheck::Invalid(INVALID_TOKEN);
        };

        let claims = match self.tokens.decode(token) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                tracing::warn!("Reset token check failed - token expired");
                return ResetTokenCheck::Expired;
            }
            Err(TokenError::Invalid(reason)) => {
                tracing::warn!(reason = %reason, "Reset token check failed - invalid token");
                return ResetTokenCheck::Invalid(INVALID_TOKEN);
            }
        };

        if !claims.is_password_reset() {
            tracing::warn!(purpose = ?claims.purpose, "Reset token check failed - wrong purpose");
            return ResetTokenCheck::Invalid(WRONG_TOKEN_PURPOSE);
        }

        if claims.account_id.is_none() {
            tracing::warn!("Reset token check failed - token has no account");
            return ResetTokenCheck::Invalid(INVALID_TOKEN);
        }

        tracing::info!(account_id = ?claims.account_id, "Reset token verified");
        ResetTokenCheck::Valid {
            token: token.to_string(),
        }
    }

    /// Set a new password using a reset token. Issues no session; the
    /// client logs in again afterwards.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<()> {
        tracing::info!(has_token = !token.trim().is_empty(), "Password reset attempt");

        let token = token.trim();
        let password = password.trim();
        if token.is_empty() || password.is_empty() {
            tracing::warn!("Password reset rejected - missing fields");
            return Err(AppError::MissingFields("Token and password are required."));
        }

        validate_password(password).map_err(|reason| {
            tracing::warn!("Password reset rejected - weak password");
            AppError::WeakPassword(reason)
        })?;

        let claims = self.tokens.decode(token).map_err(|e| {
            tracing::warn!(error = %e, "Password reset rejected - bad token");
            match e {
                TokenError::Expired => AppError::TokenExpired,
                TokenError::Invalid(_) => AppError::InvalidToken(INVALID_TOKEN),
            }
        })?;

        if !claims.is_password_reset() {
            tracing::warn!(purpose = ?claims.purpose, "Password reset rejected - wrong purpose");
            return Err(AppError::InvalidToken(WRONG_TOKEN_PURPOSE));
        }

        let Some(account_id) = claims.account_id else {
            tracing::warn!("Password reset rejected - token has no account");
            return Err(AppError::InvalidToken(INVALID_TOKEN));
        };

        let not_found = || {
            tracing::warn!(account_id = %account_id, "Password reset failed - account not found");
            AppError::UserNotFound
        };

        if self.store.find_by_id(&account_id).await?.is_none() {
            return Err(not_found());
        }

        // Receiving the reset email proves control of the address.
        let changes = AccountChanges {
            password_hash: Some(hash_password(password.to_string()).await?),
            mark_verified: true,
            add_providers: vec![AuthProvider::Local],
            ..Default::default()
        };
        self.store
            .update(&account_id, &changes)
            .await?
            .ok_or_else(not_found)?;

        tracing::info!(account_id = %account_id, "Password reset successful");
        Ok(())
    }

    // ─── Profile ─────────────────────────────────────────────────

    /// Safe projection of the signed-in account.
    pub async fn current_account(&self, account_id: &str) -> Result<AccountView> {
        self.store
            .find_by_id(account_id)
            .await?
            .map(|account| account.view())
            .ok_or(AppError::UserNotFound)
    }
}

/// Normalize and check an email/password pair.
fn credentials(email: &str, password: &str) -> Result<(String, String)> {
    let password = password.trim();
    let email = normalize_email(email)
        .filter(|_| !password.is_empty())
        .ok_or(AppError::MissingFields(EMAIL_AND_PASSWORD_REQUIRED))?;

    if !is_valid_email(&email) {
        return Err(AppError::InvalidEmail);
    }

    Ok((email, password.to_string()))
}

/// Changes that link a Google identity to an existing account. Fields
/// already set on the account are left alone.
fn google_link_changes(
    google_id: String,
    name: Option<String>,
    picture: Option<String>,
) -> AccountChanges {
    AccountChanges {
        mark_verified: true,
        add_providers: vec![AuthProvider::Google],
        google_id: Some(google_id),
        display_name: name,
        avatar_url: picture,
        ..Default::default()
    }
}

/// A registration that loses the email to another writer reports
/// `AccountExists`.
fn registration_conflict(err: StoreError, email: &str) -> AppError {
    match err {
        StoreError::DuplicateKey(_) => {
            tracing::warn!(email, "Registration lost race - account exists");
            AppError::AccountExists
        }
        other => other.into(),
    }
}
