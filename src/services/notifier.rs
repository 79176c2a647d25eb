// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Outbound account emails.
//!
//! Delivery itself lives outside this crate. [`LogNotifier`] writes the link
//! to the log for local development, and [`MemoryNotifier`] keeps an outbox
//! that tests can inspect.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Notification could not be handed off for delivery.
#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// One-way email dispatcher. Failures are reported, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError>;

    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), NotifyError>;
}

/// Notifier that only logs the outgoing link.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        tracing::info!(email, link, "Verification email");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        tracing::info!(email, link, "Password reset email");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Verification,
    PasswordReset,
}

/// A notification captured by [`MemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub kind: NotificationKind,
    pub email: String,
    pub link: String,
}

impl SentNotification {
    /// Value of the `token` query parameter in the link, if any.
    pub fn token(&self) -> Option<&str> {
        let (_, query) = self.link.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
    }
}

/// Notifier that records every send in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<SentNotification> {
        self.sent().pop()
    }

    fn record(&self, kind: NotificationKind, email: &str, link: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError(format!("simulated failure sending to {email}")));
        }

        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentNotification {
                kind,
                email: email.to_string(),
                link: link.to_string(),
            });
        Ok(())
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send_verification(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        self.record(NotificationKind::Verification, email, link)
    }

    async fn send_password_reset(&self, email: &str, link: &str) -> Result<(), NotifyError> {
        self.record(NotificationKind::PasswordReset, email, link)
    }
}
