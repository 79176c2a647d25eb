// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Password policy and Argon2id hashing.
//!
//! Hashing is CPU-bound (tens of milliseconds with default parameters), so
//! the async helpers run it on the blocking pool.

use anyhow::Context;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Minimum password length, counted in characters after trimming.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Check the password policy on an already-trimmed password.
///
/// Returns a human-readable reason on failure.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    Ok(())
}

/// Hash a password into a PHC string with a fresh random salt.
pub fn hash_password_blocking(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))
}

/// Compare a password against a stored PHC string.
pub fn verify_password_blocking(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("invalid stored password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn hash_password(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .context("password hashing task panicked")?
}

pub async fn verify_password(password: String, stored_hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored_hash))
        .await
        .context("password verification task panicked")?
}
