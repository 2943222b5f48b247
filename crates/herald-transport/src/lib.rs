//! Delivery transports for queued messages.
//!
//! Two mechanisms are supported and exactly one is selected at startup
//! from the configuration: an SMTP relay session per message, or an
//! HTTP POST of the raw message to a provider API. Everything else in
//! the engine talks to them through the [`Deliver`] trait.

mod api;
mod compose;
mod error;
mod smtp;

use std::future::Future;

use herald_core::{Config, TransportMode};
use herald_credentials::TokenHandle;
use herald_spool::QueuedMessage;

pub use api::ApiSender;
pub use compose::{
    build_message, ComposeError, DispositionNotificationTo, ListUnsubscribe, ReturnReceiptTo,
};
pub use error::{SendError, TransportError, TransportKind};
pub use smtp::SmtpSender;

/// Async delivery of one queued message.
///
/// A send either fully succeeds or fails with a [`SendError`]; there is
/// no partial outcome, so the caller can treat `Ok` as confirmation
/// that the message left the building.
pub trait Deliver: Send + Sync {
    fn send(&self, message: &QueuedMessage) -> impl Future<Output = Result<(), SendError>> + Send;

    fn kind(&self) -> TransportKind;
}

/// The transport picked at startup.
///
/// Dispatch holds one of these for its whole lifetime; switching
/// mechanisms requires a restart.
pub enum Transport {
    Smtp(SmtpSender),
    Api(ApiSender),
}

impl Transport {
    /// Builds the configured transport. In API mode the sender reads
    /// its access token from `token` at every send.
    pub fn from_config(config: &Config, token: TokenHandle) -> Result<Self, TransportError> {
        match config.mail.mode {
            TransportMode::Smtp => {
                let smtp = config
                    .smtp
                    .as_ref()
                    .ok_or(TransportError::MissingSection(TransportKind::Smtp))?;
                Ok(Self::Smtp(SmtpSender::new(smtp)?))
            }
            TransportMode::Api => {
                let api = config
                    .api
                    .as_ref()
                    .ok_or(TransportError::MissingSection(TransportKind::Api))?;
                Ok(Self::Api(ApiSender::new(api, token)))
            }
        }
    }
}

impl Deliver for Transport {
    async fn send(&self, message: &QueuedMessage) -> Result<(), SendError> {
        match self {
            Self::Smtp(sender) => sender.send(message).await,
            Self::Api(sender) => sender.send(message).await,
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            Self::Smtp(_) => TransportKind::Smtp,
            Self::Api(_) => TransportKind::Api,
        }
    }
}
