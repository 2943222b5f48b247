//! Shared configuration, logging and startup errors for the herald engine.

mod config;
mod error;
mod logging;

pub use config::{
    ApiConfig, Config, DispatchTiming, MailConfig, SmtpConfig, SpoolConfig, SubscriptionConfig,
    TransportMode, DEFAULT_API_ENDPOINT, DEFAULT_CREDENTIAL_REFRESH_MINS,
    DEFAULT_RETRY_DELAY_MINS, DEFAULT_SMTP_PORT, DEFAULT_SMTP_SSL_PORT, DEFAULT_TICK_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
