// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Middleware modules.

pub mod auth;

pub use auth::{require_auth, AuthUser};
