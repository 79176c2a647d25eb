// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Voyage auth: account and session backend for the Voyage trip planner.
//!
//! Covers local registration with email verification, password login,
//! Google sign-in and password reset, all backed by signed expiring tokens.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

use config::Config;
use services::{AuthService, GoogleIdTokenVerifier};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    /// Present when `GOOGLE_CLIENT_ID` is configured.
    pub google_verifier: Option<Arc<GoogleIdTokenVerifier>>,
}
