use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CredentialsError, CredentialsResult};
use crate::store::StoredCredentials;

/// Shared view of the current access token.
///
/// The manager writes it after every successful load or refresh and
/// clears it when credentials become unusable; the API transport only
/// ever reads it.
pub type TokenHandle = Arc<RwLock<Option<String>>>;

/// Keeps the cached OAuth credentials usable.
///
/// Owns the credentials file and the shared token handle. The dispatch
/// loop calls [`CredentialManager::ensure_fresh`] on its own schedule;
/// each call re-reads the cache, refreshes over HTTP when the token has
/// expired and a refresh token is on hand, and persists whatever the
/// authorization server handed back.
pub struct CredentialManager {
    path: PathBuf,
    http: reqwest::Client,
    token: TokenHandle,
}

impl CredentialManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            http: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Handle for transports that need the current token.
    pub fn token_handle(&self) -> TokenHandle {
        Arc::clone(&self.token)
    }

    /// Loads the cache and refreshes the access token if needed.
    ///
    /// On success the shared handle holds a usable token. On failure
    /// the handle is cleared so sends fail fast instead of going out
    /// with a dead token.
    pub async fn ensure_fresh(&self) -> CredentialsResult<()> {
        match self.refresh_inner(Utc::now()).await {
            Ok(token) => {
                *self.token.write().await = Some(token);
                Ok(())
            }
            Err(e) => {
                *self.token.write().await = None;
                Err(e)
            }
        }
    }

    async fn refresh_inner(&self, now: DateTime<Utc>) -> CredentialsResult<String> {
        let mut creds = StoredCredentials::load(&self.path)?;

        if creds.is_fresh_at(now) {
            debug!("Cached access token is still fresh");
            if let Some(token) = creds.token {
                return Ok(token);
            }
        }

        if !creds.can_refresh() {
            return Err(CredentialsError::Unavailable(
                "cached token expired and no refresh token is available".to_string(),
            ));
        }

        let token = self.request_refresh(&mut creds, now).await?;

        // The refresh already succeeded; a cache that fails to persist
        // only costs an extra refresh after the next restart.
        if let Err(e) = creds.save(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to persist refreshed credentials");
        }

        Ok(token)
    }

    async fn request_refresh(
        &self,
        creds: &mut StoredCredentials,
        now: DateTime<Utc>,
    ) -> CredentialsResult<String> {
        // can_refresh() was checked by the caller.
        let (Some(refresh_token), Some(token_uri), Some(client_id), Some(client_secret)) = (
            creds.refresh_token.clone(),
            creds.token_uri.clone(),
            creds.client_id.clone(),
            creds.client_secret.clone(),
        ) else {
            return Err(CredentialsError::Unavailable(
                "refresh requires refresh_token, token_uri, client_id and client_secret"
                    .to_string(),
            ));
        };

        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &client_id),
                ("client_secret", &client_secret),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let detail = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(CredentialsError::Unavailable(format!(
                "token refresh failed ({status}): {detail}"
            )));
        }

        let token = apply_refresh(creds, &body, now)?;
        info!(expiry = ?creds.expiry, "Refreshed access token");
        Ok(token)
    }
}

/// Folds a successful token response into the cached credentials and
/// returns the new access token. Rotated refresh tokens replace the
/// stored one so they survive a crash.
fn apply_refresh(
    creds: &mut StoredCredentials,
    body: &serde_json::Value,
    now: DateTime<Utc>,
) -> CredentialsResult<String> {
    let token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            CredentialsError::Unavailable("no access_token in refresh response".to_string())
        })?
        .to_string();

    creds.token = Some(token.clone());
    creds.expiry = body
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .map(|secs| now + Duration::seconds(secs));
    if let Some(rotated) = body.get("refresh_token").and_then(|v| v.as_str()) {
        creds.refresh_token = Some(rotated.to_string());
    }

    Ok(token)
}
