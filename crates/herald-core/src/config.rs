//! Typed configuration for the dispatch engine.
//!
//! The configuration is a single TOML file deserialized once at startup.
//! Unknown keys are rejected and cross-field rules are checked by
//! [`Config::validate`] before anything else runs, so a bad deployment dies
//! at boot instead of at the first send.

use crate::{CoreError, CoreResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Default SMTP port when implicit TLS is enabled.
pub const DEFAULT_SMTP_SSL_PORT: u16 = 465;

/// Default SMTP port for plaintext or STARTTLS connections.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default API endpoint messages are submitted to.
pub const DEFAULT_API_ENDPOINT: &str =
    "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Default seconds between dispatch ticks.
pub const DEFAULT_TICK_SECS: u64 = 1;

/// Default minutes the whole queue pauses after a failed delivery.
pub const DEFAULT_RETRY_DELAY_MINS: u64 = 30;

/// Default minutes between credential refresh attempts.
pub const DEFAULT_CREDENTIAL_REFRESH_MINS: u64 = 30;

/// Which delivery transport the process uses; fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Direct SMTP delivery.
    Smtp,
    /// OAuth-backed sending API.
    Api,
}

/// Main engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mail: MailConfig,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    pub spool: SpoolConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub dispatch: DispatchTiming,
}

/// `[mail]` table: sender identity and transport selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    /// The `From` address for every outgoing message.
    pub sender: String,
    /// Transport selector; defaults to the API transport.
    #[serde(default = "default_mode")]
    pub mode: TransportMode,
}

fn default_mode() -> TransportMode {
    TransportMode::Api
}

/// `[smtp]` table: connection parameters for the SMTP transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    /// Explicit port; when absent, 465 under `ssl` and 25 otherwise.
    #[serde(default)]
    pub port: Option<u16>,
    /// Implicit TLS from the first byte.
    #[serde(default)]
    pub ssl: bool,
    /// STARTTLS upgrade after connecting.
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl SmtpConfig {
    /// The port sends actually connect to.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.ssl {
            DEFAULT_SMTP_SSL_PORT
        } else {
            DEFAULT_SMTP_PORT
        })
    }
}

/// `[api]` table: credential location and submit endpoint for the API transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Cached OAuth credential file, rewritten after each refresh.
    pub token_path: PathBuf,
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

/// `[spool]` table: where queued messages live on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpoolConfig {
    /// Queue directory; operator-provisioned, must already exist.
    pub dir: PathBuf,
    /// Optional quarantine directory for malformed entries.
    #[serde(default)]
    pub dead_letter_dir: Option<PathBuf>,
}

/// `[subscription]` table: unsubscribe-link settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionConfig {
    /// Base site URL unsubscribe links are built from.
    #[serde(default)]
    pub site_url: Option<String>,
    /// Emit a `List-Unsubscribe` header and per-recipient links.
    #[serde(default)]
    pub enable_list_unsubscribe: bool,
}

/// `[dispatch]` table: timing overrides for the dispatch loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchTiming {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default = "default_retry_delay_mins")]
    pub retry_delay_mins: u64,
    #[serde(default = "default_credential_refresh_mins")]
    pub credential_refresh_mins: u64,
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}

fn default_retry_delay_mins() -> u64 {
    DEFAULT_RETRY_DELAY_MINS
}

fn default_credential_refresh_mins() -> u64 {
    DEFAULT_CREDENTIAL_REFRESH_MINS
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            retry_delay_mins: DEFAULT_RETRY_DELAY_MINS,
            credential_refresh_mins: DEFAULT_CREDENTIAL_REFRESH_MINS,
        }
    }
}

impl Config {
    /// Load, normalize and validate the configuration from a TOML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            CoreError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the filesystem rules; used by tests.
    pub fn parse(content: &str) -> CoreResult<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    fn normalize(&mut self) {
        if let Some(url) = &mut self.subscription.site_url {
            while url.ends_with('/') {
                url.pop();
            }
        }
    }

    /// Cross-field rules that serde alone cannot express.
    pub fn validate(&self) -> CoreResult<()> {
        match self.mail.mode {
            TransportMode::Smtp => {
                if self.smtp.is_none() {
                    return Err(CoreError::Config(
                        "mail.mode = \"smtp\" requires an [smtp] table".to_string(),
                    ));
                }
            }
            TransportMode::Api => {
                if self.api.is_none() {
                    return Err(CoreError::Config(
                        "mail.mode = \"api\" requires an [api] table".to_string(),
                    ));
                }
            }
        }

        if let Some(smtp) = &self.smtp {
            if smtp.ssl && smtp.tls {
                return Err(CoreError::Config(
                    "smtp.ssl and smtp.tls are mutually exclusive".to_string(),
                ));
            }
            if smtp.password.is_some() && smtp.user.is_none() {
                return Err(CoreError::Config(
                    "smtp.password is set but smtp.user is not".to_string(),
                ));
            }
        }

        if !self.spool.dir.is_dir() {
            return Err(CoreError::Config(format!(
                "spool directory does not exist: {}",
                self.spool.dir.display()
            )));
        }
        if let Some(dead_letter) = &self.spool.dead_letter_dir {
            if !dead_letter.is_dir() {
                return Err(CoreError::Config(format!(
                    "dead-letter directory does not exist: {}",
                    dead_letter.display()
                )));
            }
        }

        if let Some(url) = &self.subscription.site_url {
            Url::parse(url)?;
        }
        if self.subscription.enable_list_unsubscribe && self.subscription.site_url.is_none() {
            return Err(CoreError::Config(
                "subscription.enable_list_unsubscribe requires subscription.site_url".to_string(),
            ));
        }

        if self.dispatch.tick_secs == 0 {
            return Err(CoreError::Config(
                "dispatch.tick_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL for unsubscribe links, without a trailing slash.
    pub fn site_url(&self) -> Option<&str> {
        self.subscription.site_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn minimal_smtp(spool_dir: &Path) -> String {
        format!(
            r#"
            [mail]
            sender = "news@example.org"
            mode = "smtp"

            [smtp]
            host = "mail.example.org"
            ssl = true

            [spool]
            dir = "{}"
            "#,
            spool_dir.display()
        )
    }

    #[test]
    fn test_load_minimal_smtp_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, minimal_smtp(dir.path())).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.mail.mode, TransportMode::Smtp);
        assert_eq!(config.mail.sender, "news@example.org");
        assert_eq!(config.dispatch.tick_secs, DEFAULT_TICK_SECS);
        assert_eq!(config.dispatch.retry_delay_mins, DEFAULT_RETRY_DELAY_MINS);
    }

    #[test]
    fn test_mode_defaults_to_api() {
        let config = Config::parse(
            r#"
            [mail]
            sender = "news@example.org"

            [api]
            token_path = "/tmp/token.json"

            [spool]
            dir = "/tmp/spool"
            "#,
        )
        .unwrap();
        assert_eq!(config.mail.mode, TransportMode::Api);
        assert_eq!(config.api.unwrap().endpoint, DEFAULT_API_ENDPOINT);
    }

    #[test]
    fn test_smtp_port_defaults_follow_ssl_flag() {
        let ssl = SmtpConfig {
            host: "h".into(),
            port: None,
            ssl: true,
            tls: false,
            user: None,
            password: None,
        };
        assert_eq!(ssl.effective_port(), DEFAULT_SMTP_SSL_PORT);

        let plain = SmtpConfig { ssl: false, ..ssl.clone() };
        assert_eq!(plain.effective_port(), DEFAULT_SMTP_PORT);

        let explicit = SmtpConfig { port: Some(2525), ..plain };
        assert_eq!(explicit.effective_port(), 2525);
    }

    #[test]
    fn test_mode_without_matching_table_is_rejected() {
        let dir = tempdir().unwrap();
        let config = Config::parse(&format!(
            r#"
            [mail]
            sender = "news@example.org"
            mode = "api"

            [spool]
            dir = "{}"
            "#,
            dir.path().display()
        ))
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_missing_spool_dir_is_rejected() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("missing");
        let config = Config::parse(&minimal_smtp(&gone)).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spool directory"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = Config::parse(
            r#"
            [mail]
            sender = "news@example.org"
            typo_key = true

            [spool]
            dir = "/tmp/spool"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_ssl_and_tls_are_mutually_exclusive() {
        let dir = tempdir().unwrap();
        let mut config = Config::parse(&minimal_smtp(dir.path())).unwrap();
        config.smtp.as_mut().unwrap().tls = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_url_trailing_slash_is_trimmed() {
        let config = Config::parse(
            r#"
            [mail]
            sender = "news@example.org"

            [api]
            token_path = "/tmp/token.json"

            [spool]
            dir = "/tmp/spool"

            [subscription]
            site_url = "https://news.example.org/"
            enable_list_unsubscribe = true
            "#,
        )
        .unwrap();
        assert_eq!(config.site_url(), Some("https://news.example.org"));
    }

    #[test]
    fn test_unsubscribe_flag_requires_site_url() {
        let dir = tempdir().unwrap();
        let mut config = Config::parse(&minimal_smtp(dir.path())).unwrap();
        config.subscription.enable_list_unsubscribe = true;
        assert!(config.validate().is_err());
    }
}
