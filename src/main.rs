// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Voyage auth API server.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voyage_auth::{
    config::{Config, StoreBackend},
    db::{AccountStore, FirestoreDb, MemoryAccountStore},
    services::{AuthService, GoogleIdTokenVerifier, LogNotifier},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, store = ?config.account_store, "Starting Voyage auth API");

    let store: Arc<dyn AccountStore> = match config.account_store {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory account store; accounts are lost on restart");
            Arc::new(MemoryAccountStore::new())
        }
    };

    let auth = AuthService::new(&config, store, Arc::new(LogNotifier))?;

    let google_verifier = match &config.google_client_id {
        Some(client_id) => {
            tracing::info!("Google ID token verification enabled");
            Some(Arc::new(GoogleIdTokenVerifier::new(client_id.clone())?))
        }
        None => {
            tracing::warn!("GOOGLE_CLIENT_ID not set; trusting client-supplied Google profiles");
            None
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        auth,
        google_verifier,
    });

    let app = voyage_auth::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voyage_auth=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
