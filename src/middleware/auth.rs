// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! JWT authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie the web client may use instead of an Authorization header.
pub const SESSION_COOKIE: &str = "voyage_token";

/// Authenticated account extracted from a session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: String,
}

/// Middleware that requires a valid session token.
///
/// Password reset tokens are signed with the same key but never grant a
/// session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => token.trim().to_string(),
            None => return Err(AppError::Unauthorized),
        }
    };

    let claims = state.auth.tokens().decode(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized
    })?;

    if claims.is_password_reset() {
        tracing::warn!("Password reset token presented as session");
        return Err(AppError::Unauthorized);
    }

    let account_id = claims.account_id.ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(AuthUser { account_id });

    Ok(next.run(request).await)
}
