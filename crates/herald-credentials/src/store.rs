use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CredentialsError, CredentialsResult};

/// How long before the recorded expiry a token is already treated as
/// expired, so a send never races the real deadline.
pub const EXPIRY_LEEWAY_SECS: i64 = 300;

/// Cached OAuth credentials in the authorized-user JSON layout used by
/// Google tooling, so a file produced by their flows drops in as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// Current access token, if one has been obtained.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token stops working.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    /// Reads cached credentials. A missing or unparsable file is
    /// reported as [`CredentialsError::Unavailable`]; the caller logs
    /// it and retries on the next refresh interval.
    pub fn load(path: &Path) -> CredentialsResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            CredentialsError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        let creds: Self = serde_json::from_str(&raw).map_err(|e| {
            CredentialsError::Unavailable(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded cached credentials");
        Ok(creds)
    }

    /// Writes the credentials back to disk with 0600 permissions,
    /// through a temp file so a crash never truncates the cache.
    pub fn save(&self, path: &Path) -> CredentialsResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            CredentialsError::Unavailable(format!("failed to serialize credentials: {e}"))
        })?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, &json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp_path, path)?;

        debug!(path = %path.display(), "Persisted credentials");
        Ok(())
    }

    /// Whether the cached access token can still be used at `now`.
    ///
    /// A missing expiry is trusted; credentials without a token are
    /// never fresh.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_none() {
            return false;
        }
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_LEEWAY_SECS) < expiry,
            None => true,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Whether everything needed for a refresh round-trip is on hand.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
            && self.token_uri.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
    }
}
