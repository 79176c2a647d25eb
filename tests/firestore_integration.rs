// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it. They are skipped otherwise.

use std::sync::Arc;
use voyage_auth::db::{AccountStore, FirestoreDb, StoreError};
use voyage_auth::models::{Account, AccountChanges, AuthProvider};

mod common;
use common::test_db;

/// Generate a unique email for test isolation.
fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_create_and_find_account() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("create");

    assert!(!db.exists(&email).await.unwrap());

    let mut account = Account::new(&email);
    account.password_hash = Some("$argon2id$fake".to_string());
    account.add_provider(AuthProvider::Local);
    db.create(&account).await.unwrap();

    assert!(db.exists(&email).await.unwrap());
    let by_email = db.find_by_email(&email).await.unwrap().unwrap();
    let by_id = db.find_by_id(&account.id).await.unwrap().unwrap();
    assert_eq!(by_email, account);
    assert_eq!(by_id, account);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("dup");

    db.create(&Account::new(&email)).await.unwrap();
    let err = db.create(&Account::new(&email)).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)), "{err:?}");
}

#[tokio::test]
async fn test_update_applies_changes() {
    require_emulator!();

    let db = test_db().await;
    let mut account = Account::new(unique_email("update"));
    account.google_id = Some("google-sub-1".to_string());
    db.create(&account).await.unwrap();

    let updated = db
        .update(
            &account.id,
            &AccountChanges {
                mark_verified: true,
                add_providers: vec![AuthProvider::Google],
                google_id: Some("google-sub-9".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    let stored = db.find_by_id(&account.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
    assert!(stored.is_email_verified);
    assert_eq!(stored.google_id.as_deref(), Some("google-sub-1"));

    let missing = db
        .update("no-such-account", &AccountChanges::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_concurrent_updates_keep_both_changes() {
    require_emulator!();

    let db: Arc<FirestoreDb> = Arc::new(test_db().await);
    let account = Account::new(unique_email("merge"));
    db.create(&account).await.unwrap();

    let reset = {
        let db = db.clone();
        let id = account.id.clone();
        tokio::spawn(async move {
            let changes = AccountChanges {
                password_hash: Some("$argon2id$new".to_string()),
                ..Default::default()
            };
            db.update(&id, &changes).await
        })
    };
    let link = {
        let db = db.clone();
        let id = account.id.clone();
        tokio::spawn(async move {
            let changes = AccountChanges {
                mark_verified: true,
                add_providers: vec![AuthProvider::Google],
                ..Default::default()
            };
            db.update(&id, &changes).await
        })
    };
    reset.await.unwrap().unwrap();
    link.await.unwrap().unwrap();

    let stored = db.find_by_id(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$new"));
    assert!(stored.is_email_verified);
}

#[tokio::test]
async fn test_rolled_back_transaction_writes_nothing() {
    require_emulator!();

    let db = test_db().await;
    let account = Account::new(unique_email("rollback"));

    let mut tx = db.begin().await.unwrap();
    tx.create(&account).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(!db.exists(&account.email).await.unwrap());
    assert!(db.find_by_id(&account.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_staging_sees_committed_claim() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("staged");

    let mut tx = db.begin().await.unwrap();
    db.create(&Account::new(&email)).await.unwrap();

    let err = tx.create(&Account::new(&email)).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)), "{err:?}");
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_creates_one_winner() {
    require_emulator!();

    let db: Arc<FirestoreDb> = Arc::new(test_db().await);
    let email = unique_email("race");

    let mut handles = vec![];
    for _ in 0..5 {
        let db = db.clone();
        let email = email.clone();
        handles.push(tokio::spawn(async move {
            db.create(&Account::new(email)).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => created += 1,
            Err(StoreError::DuplicateKey(_)) => {}
            // Contended emulator transactions may also abort outright.
            Err(StoreError::Backend(_)) => {}
        }
    }

    assert_eq!(created, 1);
}
