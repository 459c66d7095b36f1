use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::services::prober::ProbeError;

/// Tokens are refreshed this long before they actually expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A two-legged access token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build a token from a provider `expires_in`, or `None` when the lifetime
    /// is negative or cannot be represented.
    pub fn issued(access_token: String, now: DateTime<Utc>, expires_in: i64) -> Option<Self> {
        if expires_in < 0 {
            return None;
        }
        let expires_at = now.checked_add_signed(Duration::try_seconds(expires_in)?)?;
        Some(Self {
            access_token,
            expires_at,
        })
    }

    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin <= now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client-credentials token provider with refresh-on-expiry caching.
///
/// Concurrent callers wait on the same lock, so at most one refresh is in
/// flight at a time.
pub struct TokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scopes: String,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(
        http: Client,
        base_url: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &str,
    ) -> Self {
        Self {
            http,
            token_url: format!("{}/authentication/v2/token", base_url.trim_end_matches('/')),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes: scopes.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Return a bearer token valid for at least the refresh margin.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
                return Ok(token.access_token.clone());
            }
            tracing::debug!(expires_at = %token.expires_at, "Access token near expiry, refreshing");
        }

        let fresh = self.fetch().await?;
        tracing::info!(expires_at = %fresh.expires_at, "Obtained provider access token");
        let value = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token, e.g. after the provider rejected it.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    async fn fetch(&self) -> Result<AccessToken, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", self.scopes.as_str()),
            ])
            .send()
            .await
            .map_err(AuthError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        let body: TokenResponse = response.json().await.map_err(AuthError::Http)?;
        AccessToken::issued(body.access_token, Utc::now(), body.expires_in)
            .ok_or(AuthError::InvalidExpiry(body.expires_in))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token request rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("Token response has unusable expires_in: {0}")]
    InvalidExpiry(i64),
}

impl From<AuthError> for ProbeError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::Http(_) => ProbeError::Transient(err.to_string()),
            AuthError::Rejected { status, .. } => ProbeError::from_status(*status, err.to_string()),
            AuthError::InvalidExpiry(_) => ProbeError::Permanent(err.to_string()),
        }
    }
}
