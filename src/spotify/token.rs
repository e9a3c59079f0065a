//! Client Credentials token acquisition and caching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use super::error::ApiError;
use super::retry::RetryPolicy;

/// Safety margin subtracted from the server-advertised token lifetime.
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL: u64 = 3600;

/// Longest lifetime trusted regardless of what the token endpoint advertises.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Client id/secret pair. Immutable after construction.
#[derive(Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into().trim().to_string(),
            client_secret: client_secret.into().trim().to_string(),
        }
    }

    /// Fails with [`ApiError::Configuration`] when either half is blank.
    fn validate(&self) -> Result<(), ApiError> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("CLIENT_ID");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("CLIENT_SECRET");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Configuration(format!(
                "set {} in the environment or .env file",
                missing.join(" and ")
            )))
        }
    }

    fn basic_auth(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret).as_bytes());
        format!("Basic {}", encoded)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A bearer token together with the instant it stops being trusted.
#[derive(Clone, Debug)]
pub(crate) struct SessionToken {
    pub(crate) access_token: String,
    pub(crate) expires_at: Instant,
}

impl SessionToken {
    /// `expires_at = issued_at + ttl - margin`, saturating at `issued_at` and
    /// capped at [`MAX_TOKEN_LIFETIME`].
    pub(crate) fn issued(
        access_token: String,
        issued_at: Instant,
        ttl: Duration,
        margin: Duration,
    ) -> Self {
        let lifetime = ttl.saturating_sub(margin).min(MAX_TOKEN_LIFETIME);
        Self {
            access_token,
            expires_at: issued_at.checked_add(lifetime).unwrap_or(issued_at),
        }
    }

    pub(crate) fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Sole owner of the cached session token.
pub(crate) struct TokenManager {
    http: Client,
    token_url: String,
    credentials: Credentials,
    policy: RetryPolicy,
    margin: Duration,
    token: RwLock<Option<SessionToken>>,
    // Bumped by `clear`; a renewal started under an older generation is not cached.
    generation: AtomicU64,
    // Serializes renewals so concurrent callers share one token exchange.
    renewal: Mutex<()>,
}

impl TokenManager {
    pub(crate) fn new(
        http: Client,
        token_url: String,
        credentials: Credentials,
        policy: RetryPolicy,
        margin: Duration,
    ) -> Self {
        Self {
            http,
            token_url,
            credentials,
            policy,
            margin,
            token: RwLock::new(None),
            generation: AtomicU64::new(0),
            renewal: Mutex::new(()),
        }
    }

    async fn cached(&self) -> Option<String> {
        let guard = self.token.read().await;
        guard
            .as_ref()
            .filter(|t| t.is_valid_at(Instant::now()))
            .map(|t| t.access_token.clone())
    }

    /// Returns a valid access token, renewing it if needed.
    pub(crate) async fn get_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.cached().await {
            tracing::debug!("using cached access token");
            return Ok(token);
        }

        let _renewal = self.renewal.lock().await;
        // Another caller may have renewed while we waited.
        if let Some(token) = self.cached().await {
            return Ok(token);
        }

        self.credentials.validate()?;

        let generation = self.generation.load(Ordering::SeqCst);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_token().await {
                Ok(token) => {
                    let access_token = token.access_token.clone();
                    let mut cache = self.token.write().await;
                    if self.generation.load(Ordering::SeqCst) == generation {
                        *cache = Some(token);
                    }
                    drop(cache);
                    tracing::info!("obtained Spotify access token");
                    return Ok(access_token);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "token request failed");
                    if attempt >= max_attempts {
                        self.invalidate().await;
                        return Err(ApiError::AuthenticationFailed {
                            attempts: max_attempts,
                            source: Box::new(err),
                        });
                    }
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Drops the cached token so the next caller renews it.
    pub(crate) async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// Like [`invalidate`](Self::invalidate), and also keeps a renewal already
    /// in progress from caching the token it obtains.
    pub(crate) async fn clear(&self) {
        let mut cache = self.token.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *cache = None;
    }

    async fn fetch_token(&self) -> Result<SessionToken, ApiError> {
        let params = [("grant_type", "client_credentials")];

        let res = self
            .http
            .post(&self.token_url)
            .header("Authorization", self.credentials.basic_auth())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                    ApiError::InvalidCredentials { body }
                }
                _ => ApiError::Upstream {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let text = res.text().await?;
        let body: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::Protocol(format!("malformed token response: {}", e)))?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Protocol("malformed token response".into()))?;
        let ttl = Duration::from_secs(body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL));

        Ok(SessionToken::issued(
            access_token,
            Instant::now(),
            ttl,
            self.margin,
        ))
    }
}
