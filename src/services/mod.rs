// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Services module - business logic layer.

pub mod auth;
pub mod google_oidc;
pub mod notifier;
pub mod password;
pub mod token;

pub use auth::{AuthService, AuthSession, EmailVerification, GoogleProfile, ResetTokenCheck};
pub use google_oidc::{GoogleIdTokenVerifier, GoogleIdentity, OidcError};
pub use notifier::{LogNotifier, MemoryNotifier, Notifier};
pub use token::{TokenClaims, TokenCodec, TokenError};
