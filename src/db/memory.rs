// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! In-memory account directory (local development and tests).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::PoisonError;
use tokio::sync::Mutex;

use super::{AccountStore, AccountTransaction, StoreError};
use crate::models::{Account, AccountChanges};

#[derive(Default)]
struct StoreData {
    accounts: HashMap<String, Account>, // id -> account
    emails: HashMap<String, String>,    // email -> id
}

impl StoreData {
    fn insert(&mut self, account: &Account) -> Result<(), StoreError> {
        if self.emails.contains_key(&account.email) {
            return Err(StoreError::DuplicateKey(account.email.clone()));
        }
        self.emails.insert(account.email.clone(), account.id.clone());
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }
}

/// Account directory held in process memory.
#[derive(Default)]
pub struct MemoryAccountStore {
    data: Mutex<StoreData>,
    /// Emails staged by open transactions. Never held across an await.
    claims: std::sync::Mutex<HashSet<String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.data.lock().await.accounts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn release_claims(&self, emails: &[String]) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        for email in emails {
            claims.remove(email);
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let data = self.data.lock().await;
        Ok(data
            .emails
            .get(email)
            .and_then(|id| data.accounts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.data.lock().await.accounts.get(id).cloned())
    }

    async fn exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.data.lock().await.emails.contains_key(email))
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        self.data.lock().await.insert(account)
    }

    async fn update(
        &self,
        id: &str,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        let mut data = self.data.lock().await;
        Ok(data.accounts.get_mut(id).map(|account| {
            changes.apply(account);
            account.clone()
        }))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn AccountTransaction + 'a>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            staged: Vec::new(),
        }))
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryAccountStore,
    staged: Vec<Account>,
}

impl MemoryTransaction<'_> {
    fn staged_emails(&self) -> Vec<String> {
        self.staged.iter().map(|a| a.email.clone()).collect()
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        let emails = self.staged_emails();
        self.store.release_claims(&emails);
    }
}

#[async_trait]
impl AccountTransaction for MemoryTransaction<'_> {
    async fn create(&mut self, account: &Account) -> Result<(), StoreError> {
        let data = self.store.data.lock().await;
        let mut claims = self
            .store
            .claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if data.emails.contains_key(&account.email) || !claims.insert(account.email.clone()) {
            return Err(StoreError::DuplicateKey(account.email.clone()));
        }
        drop(claims);

        self.staged.push(account.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut data = self.store.data.lock().await;

        // Check everything first so a conflict leaves no partial writes.
        for account in &self.staged {
            if data.emails.contains_key(&account.email) {
                return Err(StoreError::DuplicateKey(account.email.clone()));
            }
        }
        for account in &self.staged {
            data.insert(account)?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        tracing::debug!(staged = self.staged.len(), "Discarding staged account writes");
        Ok(())
    }
}
