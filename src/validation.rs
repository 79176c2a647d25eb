// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Email normalization and format checks.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Canonicalize an email so logically identical addresses share one key.
///
/// Returns `None` when nothing is left after trimming.
pub fn normalize_email(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let Some((local, domain)) = lowered.rsplit_once('@') else {
        return Some(lowered);
    };

    let (local, domain) = match domain {
        "gmail.com" | "googlemail.com" => (strip_tag(local, '+').replace('.', ""), "gmail.com"),
        "outlook.com" | "hotmail.com" | "live.com" | "icloud.com" | "me.com" => {
            (strip_tag(local, '+').to_string(), domain)
        }
        "yahoo.com" | "ymail.com" => (strip_tag(local, '-').to_string(), domain),
        _ => (local.to_string(), domain),
    };

    Some(format!("{local}@{domain}"))
}

/// Drop a sub-address tag (`user+tag` -> `user`).
fn strip_tag(local: &str, separator: char) -> &str {
    local.split(separator).next().unwrap_or(local)
}

/// Basic `user@domain.tld` check on already-normalized input.
pub fn is_valid_email(email_normalized: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(email_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  USER@Example.com ").as_deref(),
            Some("user@example.com")
        );
    }

    #[test]
    fn test_normalize_empty_is_none() {
        assert_eq!(normalize_email(""), None);
        assert_eq!(normalize_email("   "), None);
    }

    #[test]
    fn test_normalize_gmail_variants_collide() {
        let a = normalize_email("John.Doe+trips@gmail.com");
        let b = normalize_email("johndoe@googlemail.com");
        assert_eq!(a.as_deref(), Some("johndoe@gmail.com"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_provider_subaddresses() {
        assert_eq!(
            normalize_email("me+x@outlook.com").as_deref(),
            Some("me@outlook.com")
        );
        assert_eq!(
            normalize_email("me-x@yahoo.com").as_deref(),
            Some("me@yahoo.com")
        );
        // Other domains keep their tags.
        assert_eq!(
            normalize_email("me+x@example.com").as_deref(),
            Some("me+x@example.com")
        );
    }

    #[test]
    fn test_normalize_without_at_keeps_text() {
        assert_eq!(normalize_email("NotAnEmail").as_deref(), Some("notanemail"));
    }

    #[test]
    fn test_email_pattern_compiles_once() {
        assert!(EMAIL_PATTERN.is_some());
        let first = EMAIL_PATTERN.as_ref().map(|re| re as *const Regex);
        assert!(is_valid_email("user@example.com"));
        let second = EMAIL_PATTERN.as_ref().map(|re| re as *const Regex);
        assert_eq!(first, second);
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b@sub.example.co"));

        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
    }
}
