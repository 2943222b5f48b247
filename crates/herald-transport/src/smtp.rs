//! SMTP delivery.

use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

use herald_core::SmtpConfig;
use herald_spool::QueuedMessage;

use crate::compose::build_message;
use crate::error::{SendError, TransportError, TransportKind};

/// Delivers messages through an SMTP relay.
///
/// The transport holds no pooled connections: every send opens a fresh
/// session, authenticates when credentials are configured, submits the
/// message and closes the session again.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpSender {
    /// Builds the relay client from the SMTP section of the config.
    ///
    /// `ssl` selects implicit TLS on connect, `tls` upgrades via
    /// STARTTLS, and with neither flag the session stays plaintext for
    /// relays on a trusted network.
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.effective_port());

        if config.ssl || config.tls {
            let tls = TlsParameters::builder(config.host.clone()).build()?;
            builder = if config.ssl {
                builder.tls(Tls::Wrapper(tls))
            } else {
                builder.tls(Tls::Required(tls))
            };
        }

        if let Some(user) = &config.user {
            let password = config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
        })
    }

    pub async fn send(&self, message: &QueuedMessage) -> Result<(), SendError> {
        let email = build_message(message)
            .map_err(|e| SendError::new(TransportKind::Smtp, e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| SendError::new(TransportKind::Smtp, e.to_string()))?;

        debug!(
            host = %self.host,
            recipient = %message.recipient,
            "Delivered message over SMTP"
        );
        Ok(())
    }
}
