// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Every variant except the server-side ones is an expected rejection that
/// the client can branch on via [`AppError::code`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    MissingFields(&'static str),

    #[error("Invalid email format.")]
    InvalidEmail,

    #[error("{0}")]
    WeakPassword(String),

    #[error("An account with this email already exists.")]
    AccountExists,

    #[error("An account with this email already exists.")]
    DuplicateAccount,

    #[error("Incorrect email or password.")]
    InvalidCredentials,

    #[error("This account signs in with a social provider. Please use that sign-in method.")]
    NoPasswordSet,

    #[error("{}", email_not_verified_message(.resent))]
    EmailNotVerified { resent: bool },

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("This link has expired. Please request a new one.")]
    TokenExpired,

    #[error("User not found.")]
    UserNotFound,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

fn email_not_verified_message(resent: &bool) -> &'static str {
    if *resent {
        "Account not verified. We have sent you a new verification email."
    } else {
        "Account not verified. We could not send a verification email, please contact support."
    }
}

/// Message used for every server error response.
const SERVER_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

impl AppError {
    /// Stable error code the front end branches on.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingFields(_) => "MISSING_FIELDS",
            AppError::InvalidEmail => "INVALID_EMAIL",
            AppError::WeakPassword(_) => "WEAK_PASSWORD",
            AppError::AccountExists => "ACCOUNT_EXISTS",
            AppError::DuplicateAccount => "DUPLICATE_ACCOUNT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::NoPasswordSet => "NO_PASSWORD_SET",
            AppError::EmailNotVerified { .. } => "EMAIL_NOT_VERIFIED",
            AppError::InvalidToken(_) => "INVALID_TOKEN",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Database(_) | AppError::Internal(_) => "SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::InvalidEmail | AppError::WeakPassword(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::AccountExists | AppError::DuplicateAccount => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::NoPasswordSet
            | AppError::InvalidToken(_)
            | AppError::TokenExpired
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified { .. } => StatusCode::FORBIDDEN,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, error) = if self.is_server_error() {
            tracing::error!(error = %self, code, "Request failed with server error");
            let detail = cfg!(debug_assertions).then(|| self.to_string());
            (SERVER_ERROR_MESSAGE.to_string(), detail)
        } else {
            (self.to_string(), None)
        };

        let body = ErrorResponse {
            success: false,
            code,
            message,
            error,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
