// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Firestore client wrapper implementing the account directory.
//!
//! Layout:
//! - `accounts/{id}` holds the account document
//! - `account_emails/{urlencoded email}` maps an email to its account ID
//!
//! Firestore has no unique field constraints, so email uniqueness comes from
//! the index document: it is always written with an "must not exist"
//! precondition in the same transaction as the account it points to.

use async_trait::async_trait;
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{FirestoreConsistencySelector, FirestoreTransaction, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};

use super::{collections, AccountStore, AccountTransaction, StoreError};
use crate::error::AppError;
use crate::models::{Account, AccountChanges};

/// Email index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndexEntry {
    account_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation fails with a backend error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::Backend("Database not connected (offline mode)".to_string()))
    }

    async fn lookup_email(&self, email: &str) -> Result<Option<EmailIndexEntry>, StoreError> {
        lookup_email_in(self.get_client()?, email).await
    }
}

async fn lookup_email_in(
    client: &firestore::FirestoreDb,
    email: &str,
) -> Result<Option<EmailIndexEntry>, StoreError> {
    client
        .fluent()
        .select()
        .by_id_in(collections::ACCOUNT_EMAILS)
        .obj()
        .one(&email_doc_id(email))
        .await
        .map_err(backend_error)
}

/// Read-modify-write body for [`AccountStore::update`]. `db` carries the
/// transaction as its consistency selector, so the read below is part of the
/// transaction and a concurrent write to the document forces a retry.
async fn apply_changes(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    id: String,
    changes: AccountChanges,
) -> Result<Option<Account>, BackoffError<FirestoreError>> {
    let current: Option<Account> = db
        .fluent()
        .select()
        .by_id_in(collections::ACCOUNTS)
        .obj()
        .one(&id)
        .await
        .map_err(BackoffError::permanent)?;

    let Some(mut account) = current else {
        return Ok(None);
    };

    if changes.apply(&mut account) {
        db.fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&account.id)
            .object(&account)
            .add_to_transaction(transaction)
            .map_err(BackoffError::permanent)?;
    }

    Ok(Some(account))
}

fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

fn backend_error(e: FirestoreError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map a commit failure, treating "already exists" conflicts as duplicates.
fn commit_error(e: FirestoreError, emails: &[String]) -> StoreError {
    match e {
        FirestoreError::DataConflictError(_) => StoreError::DuplicateKey(emails.join(",")),
        other if other.to_string().to_lowercase().contains("already exists") => {
            StoreError::DuplicateKey(emails.join(","))
        }
        other => StoreError::Backend(format!("Transaction commit failed: {}", other)),
    }
}

#[async_trait]
impl AccountStore for FirestoreDb {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        match self.lookup_email(email).await? {
            Some(entry) => self.find_by_id(&entry.account_id).await,
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNTS)
            .obj()
            .one(id)
            .await
            .map_err(backend_error)
    }

    async fn exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.lookup_email(email).await?.is_some())
    }

    async fn create(&self, account: &Account) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        tx.create(account).await?;
        tx.commit().await
    }

    async fn update(
        &self,
        id: &str,
        changes: &AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        let id = id.to_string();
        let changes = changes.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                Box::pin(apply_changes(db, transaction, id.clone(), changes.clone()))
            })
            .await
            .map_err(|e| StoreError::Backend(format!("Account update failed: {}", e)))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn AccountTransaction + 'a>, StoreError> {
        let client = self.get_client()?;
        let transaction = client
            .begin_transaction()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(FirestoreAccountTransaction {
            client,
            transaction,
            emails: Vec::new(),
        }))
    }
}

struct FirestoreAccountTransaction<'a> {
    client: &'a firestore::FirestoreDb,
    transaction: FirestoreTransaction<'a>,
    emails: Vec<String>,
}

#[async_trait]
impl AccountTransaction for FirestoreAccountTransaction<'_> {
    async fn create(&mut self, account: &Account) -> Result<(), StoreError> {
        // Read the index inside the transaction so a claim committed since
        // the caller's `exists` check is seen before anything else happens.
        let reader = self
            .client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                self.transaction.transaction_id().clone(),
            ));
        if lookup_email_in(&reader, &account.email).await?.is_some() {
            return Err(StoreError::DuplicateKey(account.email.clone()));
        }

        let index = EmailIndexEntry {
            account_id: account.id.clone(),
        };

        self.client
            .fluent()
            .update()
            .in_col(collections::ACCOUNT_EMAILS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(email_doc_id(&account.email))
            .object(&index)
            .add_to_transaction(&mut self.transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add email index to transaction: {}", e))
            })?;

        self.client
            .fluent()
            .update()
            .in_col(collections::ACCOUNTS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&account.id)
            .object(account)
            .add_to_transaction(&mut self.transaction)
            .map_err(|e| {
                StoreError::Backend(format!("Failed to add account to transaction: {}", e))
            })?;

        self.emails.push(account.email.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let FirestoreAccountTransaction {
            transaction,
            emails,
            ..
        } = *self;
        transaction
            .commit()
            .await
            .map_err(|e| commit_error(e, &emails))?;

        tracing::debug!(count = emails.len(), "Account transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.transaction
            .rollback()
            .await
            .map_err(|e| StoreError::Backend(format!("Transaction rollback failed: {}", e)))
    }
}
