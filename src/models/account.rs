// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Account model for storage and API.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity mechanism an account can authenticate through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Account document stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque account ID (also used as document ID)
    pub id: String,
    /// Normalized email, unique across accounts
    pub email: String,
    /// Argon2 PHC string; absent for accounts created through Google
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub auth_providers: Vec<AuthProvider>,
    /// Google subject ID
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    /// Build a fresh account with a new random ID and no providers.
    pub fn new(email: impl Into<String>) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            password_hash: None,
            is_email_verified: false,
            auth_providers: Vec::new(),
            google_id: None,
            display_name: None,
            avatar_url: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn has_provider(&self, provider: AuthProvider) -> bool {
        self.auth_providers.contains(&provider)
    }

    /// Add a provider tag. Returns `true` if the set changed.
    pub fn add_provider(&mut self, provider: AuthProvider) -> bool {
        if self.has_provider(provider) {
            return false;
        }
        self.auth_providers.push(provider);
        true
    }

    /// Flip the verification flag on. Returns `true` if it was previously off.
    pub fn mark_verified(&mut self) -> bool {
        let changed = !self.is_email_verified;
        self.is_email_verified = true;
        changed
    }

    pub fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }

    /// Client-safe projection of this account.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            email: self.email.clone(),
            is_email_verified: self.is_email_verified,
            auth_providers: self.auth_providers.clone(),
            name: self.display_name.clone(),
            picture: self.avatar_url.clone(),
        }
    }
}

/// Field changes applied to the latest stored copy of an account.
///
/// Every change only moves forward: providers are added, never removed,
/// verification is only switched on, and Google profile fields fill gaps
/// without overwriting. Only `password_hash` replaces an existing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub password_hash: Option<String>,
    pub mark_verified: bool,
    pub add_providers: Vec<AuthProvider>,
    /// Set only if the account has no Google ID yet.
    pub google_id: Option<String>,
    /// Set only if unset.
    pub display_name: Option<String>,
    /// Set only if unset.
    pub avatar_url: Option<String>,
}

impl AccountChanges {
    /// Apply to `account`, bumping `updated_at` if anything changed.
    /// Returns whether the account changed.
    pub fn apply(&self, account: &mut Account) -> bool {
        let mut changed = false;

        if let Some(hash) = &self.password_hash {
            if account.password_hash.as_ref() != Some(hash) {
                account.password_hash = Some(hash.clone());
                changed = true;
            }
        }
        if self.mark_verified {
            changed |= account.mark_verified();
        }
        for provider in &self.add_providers {
            changed |= account.add_provider(*provider);
        }
        changed |= fill(&mut account.google_id, &self.google_id);
        changed |= fill(&mut account.display_name, &self.display_name);
        changed |= fill(&mut account.avatar_url, &self.avatar_url);

        if changed {
            account.touch();
        }
        changed
    }
}

fn fill(slot: &mut Option<String>, value: &Option<String>) -> bool {
    match (slot.as_ref(), value) {
        (None, Some(value)) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Account fields that are safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub email: String,
    pub is_email_verified: bool,
    pub auth_providers: Vec<AuthProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}
