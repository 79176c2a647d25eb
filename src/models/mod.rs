// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Data models for the application.

pub mod account;

pub use account::{Account, AccountChanges, AccountView, AuthProvider};
