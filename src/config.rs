// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

/// Which account directory backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid("ACCOUNT_STORE", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Public API base URL (emailed links point here)
    pub api_url: String,
    /// Frontend base URL (link redirects land here)
    pub client_url: String,
    /// JWT signing key for bearer tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub account_store: StoreBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Google OAuth client ID; enables ID token verification for Google sign-in
    pub google_client_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_secret = env::var("JWT_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .unwrap_or(3001),
            api_url: base_url("API_URL", "http://localhost:3001"),
            client_url: base_url("CLIENT_URL", "http://localhost:5173"),
            jwt_signing_key: jwt_secret.into_bytes(),
            account_store: env::var("ACCOUNT_STORE")
                .map(|v| v.parse())
                .unwrap_or(Ok(StoreBackend::Firestore))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            port: 3001,
            api_url: "http://localhost:3001".to_string(),
            client_url: "http://localhost:5173".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            account_store: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            google_client_id: None,
        }
    }
}

fn base_url(var: &str, default: &str) -> String {
    env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SECRET", " test_jwt_key_32_bytes_minimum!! ");
        env::set_var("CLIENT_URL", "https://trips.example.com/");
        env::set_var("ACCOUNT_STORE", "memory");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.client_url, "https://trips.example.com");
        assert_eq!(config.account_store, StoreBackend::Memory);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(
            "Firestore".parse::<StoreBackend>().unwrap(),
            StoreBackend::Firestore
        );
        assert!(matches!(
            "postgres".parse::<StoreBackend>(),
            Err(ConfigError::Invalid("ACCOUNT_STORE", _))
        ));
    }
}
