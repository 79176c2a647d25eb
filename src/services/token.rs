// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Signed, time-boxed bearer tokens (HS256 JWT).
//!
//! Tokens are never stored. A token is valid while its signature checks out
//! and its `exp` has not passed; there is no early revocation.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime of login tokens and registration verification links.
pub const LOGIN_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Lifetime of verification links resent on login.
pub const VERIFICATION_RESEND_TTL: Duration = Duration::from_secs(30 * 60);
/// Lifetime of password reset links.
pub const PASSWORD_RESET_TTL: Duration = Duration::from_secs(15 * 60);

/// Purpose tag carried by password reset tokens.
pub const PASSWORD_RESET_PURPOSE: &str = "password-reset";

/// Claims to sign into a new token.
#[derive(Debug, Clone)]
pub struct TokenPayload {
    pub account_id: String,
    pub email: Option<String>,
    pub purpose: Option<&'static str>,
}

impl TokenPayload {
    pub fn login(account_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            email: Some(email.into()),
            purpose: None,
        }
    }

    pub fn password_reset(account_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            purpose: Some(PASSWORD_RESET_PURPOSE),
            ..Self::login(account_id, email)
        }
    }
}

/// Decoded claim set. Everything except the timestamps is optional on the
/// wire, so callers check for the claims they need.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

impl TokenClaims {
    pub fn is_password_reset(&self) -> bool {
        self.purpose.as_deref() == Some(PASSWORD_RESET_PURPOSE)
    }
}

/// Why a token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Issues and verifies bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenCodec {
    pub fn new(signing_key: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
        }
    }

    /// Sign `payload` into a token that expires after `ttl`.
    pub fn issue(&self, payload: &TokenPayload, ttl: Duration) -> anyhow::Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = TokenClaims {
            account_id: Some(payload.account_id.clone()),
            email: payload.email.clone(),
            purpose: payload.purpose.map(str::to_string),
            iat: now,
            exp: now + ttl.as_secs(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify signature and expiry, then return the claims.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
