// SPDX-License-Identifier: MIT
// Copyright 2026 The Voyage Authors

//! Google Sign-In ID token verification.
//!
//! The front end obtains an ID token from Google Identity Services and posts
//! it as `credential`. We check it against Google's published RSA keys and
//! the configured OAuth client ID before trusting the identity inside.

use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_KEYS_TTL: Duration = Duration::from_secs(300);
/// Unknown key IDs trigger a refetch at most this often.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    /// Stable Google account ID (`sub`)
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// The token is malformed, forged, expired or issued for someone else.
    #[error("Google ID token rejected: {0}")]
    Rejected(String),
    /// Google's key endpoints could not be reached.
    #[error("Google key lookup failed: {0}")]
    Transient(String),
}

enum KeySource {
    /// Keys fetched from Google and cached.
    Google {
        http_client: reqwest::Client,
        cache: RwLock<Option<KeyCache>>,
        refresh_lock: Mutex<()>,
    },
    /// A single fixed key, for tests.
    Static {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

struct KeyCache {
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
    expires_at: Instant,
}

enum CachedKey {
    Found(Arc<DecodingKey>),
    /// Not in a cache that was refreshed too recently to refetch.
    Unknown,
    /// Cache is empty, expired, or old enough to refetch for a new kid.
    Refresh,
}

impl KeyCache {
    fn lookup(cache: Option<&KeyCache>, kid: &str, now: Instant) -> CachedKey {
        let Some(entry) = cache.filter(|entry| entry.expires_at > now) else {
            return CachedKey::Refresh;
        };
        match entry.keys.get(kid) {
            Some(key) => CachedKey::Found(key.clone()),
            None if now.duration_since(entry.fetched_at) < MIN_REFRESH_INTERVAL => {
                CachedKey::Unknown
            }
            None => CachedKey::Refresh,
        }
    }
}

/// Verifier for Google-issued ID tokens addressed to one OAuth client.
pub struct GoogleIdTokenVerifier {
    client_id: String,
    source: KeySource,
}

impl GoogleIdTokenVerifier {
    /// Create a verifier that fetches and caches Google's signing keys.
    pub fn new(client_id: impl Into<String>) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Google OIDC HTTP client")?;

        let client_id = client_id.into();
        tracing::info!(client_id = %client_id, "Initialized Google ID token verifier");

        Ok(Self {
            client_id,
            source: KeySource::Google {
                http_client,
                cache: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            },
        })
    }

    /// Create a verifier that trusts exactly one RSA public key.
    pub fn new_with_static_key(
        client_id: impl Into<String>,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key id must not be empty");
        }

        Ok(Self {
            client_id: client_id.into(),
            source: KeySource::Static {
                kid,
                key: Arc::new(key),
            },
        })
    }

    /// Verify a Google ID token and extract the identity it asserts.
    pub async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, OidcError> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(OidcError::Rejected("empty credential".to_string()));
        }

        let header = decode_header(id_token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        check_issued_at(claims.iat)?;
        identity_from_claims(claims)
    }

    async fn key_for(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        let (http_client, cache, refresh_lock) = match &self.source {
            KeySource::Static {
                kid: static_kid,
                key,
            } => {
                return if kid == static_kid {
                    Ok(key.clone())
                } else {
                    Err(OidcError::Rejected(format!("unknown key id: {kid}")))
                };
            }
            KeySource::Google {
                http_client,
                cache,
                refresh_lock,
            } => (http_client, cache, refresh_lock),
        };

        match cached_key(cache, kid).await {
            CachedKey::Found(key) => return Ok(key),
            CachedKey::Unknown => return Err(unknown_kid(kid)),
            CachedKey::Refresh => {}
        }

        // A kid we have never seen may mean Google rotated keys; refetch once.
        let _guard = refresh_lock.lock().await;
        match cached_key(cache, kid).await {
            CachedKey::Found(key) => return Ok(key),
            CachedKey::Unknown => return Err(unknown_kid(kid)),
            CachedKey::Refresh => {}
        }

        let (keys, ttl) = fetch_google_keys(http_client).await?;
        let key = keys.get(kid).cloned();
        let now = Instant::now();
        *cache.write().await = Some(KeyCache {
            keys,
            fetched_at: now,
            expires_at: now + ttl,
        });

        key.ok_or_else(|| unknown_kid(kid))
    }
}

fn unknown_kid(kid: &str) -> OidcError {
    OidcError::Rejected(format!("key id not published by Google: {kid}"))
}

async fn cached_key(cache: &RwLock<Option<KeyCache>>, kid: &str) -> CachedKey {
    KeyCache::lookup(cache.read().await.as_ref(), kid, Instant::now())
}

async fn fetch_google_keys(
    http_client: &reqwest::Client,
) -> Result<(HashMap<String, Arc<DecodingKey>>, Duration), OidcError> {
    let jwks_uri = resolve_jwks_uri(http_client).await;
    tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google signing keys");

    let response = http_client
        .get(&jwks_uri)
        .send()
        .await
        .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(OidcError::Transient(format!(
            "JWKS request returned status {}",
            response.status()
        )));
    }

    let ttl = response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_KEYS_TTL);

    let jwks: Jwks = response
        .json()
        .await
        .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

    let keys: HashMap<_, _> = jwks
        .keys
        .into_iter()
        .filter(Jwk::is_rs256_signing_key)
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA key");
                None
            }
        })
        .collect();

    if keys.is_empty() {
        return Err(OidcError::Transient(
            "JWKS response did not include any usable RSA keys".to_string(),
        ));
    }

    tracing::debug!(count = keys.len(), ttl_secs = ttl.as_secs(), "Google signing keys cached");
    Ok((keys, ttl))
}

/// Find the JWKS location, falling back to the well-known URL.
async fn resolve_jwks_uri(http_client: &reqwest::Client) -> String {
    let discovered = async {
        let resp = http_client.get(DISCOVERY_URL).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<OpenIdConfig>().await.ok().map(|c| c.jwks_uri)
    }
    .await;

    discovered.unwrap_or_else(|| {
        tracing::warn!("OIDC discovery failed; using default Google JWKS URL");
        DEFAULT_JWKS_URL.to_string()
    })
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().map_or(true, |alg| alg == "RS256")
            && self.use_.as_deref().map_or(true, |use_| use_ == "sig")
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn identity_from_claims(claims: IdTokenClaims) -> Result<GoogleIdentity, OidcError> {
    let email = claims
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| OidcError::Rejected("missing email claim".to_string()))?;

    if claims.email_verified != Some(true) {
        return Err(OidcError::Rejected(
            "email_verified claim is not true".to_string(),
        ));
    }

    Ok(GoogleIdentity {
        subject: claims.sub,
        email,
        name: claims.name.filter(|n| !n.is_empty()),
        picture: claims.picture.filter(|p| !p.is_empty()),
    })
}

fn check_issued_at(iat: Option<u64>) -> Result<(), OidcError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    match iat {
        None => Err(OidcError::Rejected("missing iat claim".to_string())),
        Some(iat) if iat > now + CLOCK_SKEW_SECS => Err(OidcError::Rejected(
            "iat claim is in the future".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse().ok())
}
