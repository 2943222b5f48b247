//! HTTP API delivery.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use tracing::debug;

use herald_core::ApiConfig;
use herald_credentials::TokenHandle;
use herald_spool::QueuedMessage;

use crate::compose::build_message;
use crate::error::{SendError, TransportKind};

/// Delivers messages by POSTing them to the provider's send endpoint.
///
/// The message is submitted in the Gmail API shape: a JSON body whose
/// `raw` field holds the base64url-encoded RFC 5322 message.
pub struct ApiSender {
    http: reqwest::Client,
    endpoint: String,
    token: TokenHandle,
}

impl ApiSender {
    pub fn new(config: &ApiConfig, token: TokenHandle) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            token,
        }
    }

    /// Sends one message, or fails fast without touching the network
    /// when no access token is currently available.
    pub async fn send(&self, message: &QueuedMessage) -> Result<(), SendError> {
        let token = self.token.read().await.clone();
        let Some(token) = token else {
            return Err(SendError::new(TransportKind::Api, "credentials unavailable"));
        };

        let email = build_message(message)
            .map_err(|e| SendError::new(TransportKind::Api, e.to_string()))?;
        let raw = URL_SAFE.encode(email.formatted());

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| SendError::new(TransportKind::Api, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::new(
                TransportKind::Api,
                format!("send request failed ({status}): {body}"),
            ));
        }

        debug!(recipient = %message.recipient, "Delivered message over API");
        Ok(())
    }
}
