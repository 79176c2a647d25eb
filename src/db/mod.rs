// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Database layer: the account directory and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryAccountStore;

use crate::error::AppError;
use crate::models::{Account, AccountChanges};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    /// Email uniqueness index (keyed by url-encoded normalized email)
    pub const ACCOUNT_EMAILS: &str = "account_emails";
}

/// Storage errors surfaced by account directory operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another account already owns this email.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Database error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Directory of account records, keyed by ID with a unique email index.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    async fn exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert a new account. Fails with [`StoreError::DuplicateKey`] if the
    /// email is already taken.
    async fn create(&self, account: &Account) -> Result<(), StoreError>;

    /// Apply `changes` to the current stored copy of an account in one atomic
    /// read-modify-write. Returns the updated account, or `None` if no
    /// account has this ID.
    async fn update(
        &self,
        id: &str,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, StoreError>;

    /// Start an all-or-nothing unit of work.
    async fn begin<'a>(&'a self) -> Result<Box<dyn AccountTransaction + 'a>, StoreError>;
}

/// Staged writes that become visible only on commit.
#[async_trait]
pub trait AccountTransaction: Send {
    /// Stage an account insert. Fails with [`StoreError::DuplicateKey`] if
    /// the email is already owned or staged by another open transaction.
    async fn create(&mut self, account: &Account) -> Result<(), StoreError>;

    /// Apply all staged writes atomically. Fails with
    /// [`StoreError::DuplicateKey`] if a staged email was claimed meanwhile.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all staged writes.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
