//! Builds the RFC 5322 message a transport hands to the wire.

use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::Message;
use thiserror::Error;

use herald_spool::QueuedMessage;

/// Errors raised while turning a queued message into a wire message.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
}

/// `List-Unsubscribe` header (RFC 2369), carrying the per-recipient
/// unsubscribe URL in angle brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUnsubscribe(pub String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// `Disposition-Notification-To` header (RFC 3798), asking the
/// receiving client for a read confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionNotificationTo(pub String);

impl Header for DispositionNotificationTo {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Disposition-Notification-To")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// Legacy counterpart of `Disposition-Notification-To`, still honored
/// by some clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnReceiptTo(pub String);

impl Header for ReturnReceiptTo {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Return-Receipt-To")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// Assembles the outgoing message for one queue entry.
///
/// The body is sent as HTML. When the entry carries an unsubscribe URL
/// it is exposed through `List-Unsubscribe` so mail clients can offer
/// their own unsubscribe affordance.
pub fn build_message(message: &QueuedMessage) -> Result<Message, ComposeError> {
    let mut builder = Message::builder()
        .from(message.sender.parse()?)
        .to(message.recipient.parse()?)
        .subject(message.subject.clone())
        .header(DispositionNotificationTo(format!("<{}>", message.sender)))
        .header(ReturnReceiptTo(format!("<{}>", message.sender)))
        .header(ContentType::TEXT_HTML);

    if let Some(url) = &message.unsubscribe_url {
        builder = builder.header(ListUnsubscribe(format!("<{url}>")));
    }

    Ok(builder.body(message.text.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(unsubscribe_url: Option<&str>) -> QueuedMessage {
        QueuedMessage {
            text: "<p>fresh news</p>".to_string(),
            subject: "Weekly digest".to_string(),
            sender: "news@example.org".to_string(),
            recipient: "reader@example.org".to_string(),
            unsubscribe_url: unsubscribe_url.map(str::to_string),
        }
    }

    fn formatted(message: &QueuedMessage) -> String {
        let email = build_message(message).unwrap();
        String::from_utf8(email.formatted()).unwrap()
    }

    #[test]
    fn test_message_carries_envelope_headers() {
        let rendered = formatted(&queued(None));

        assert!(rendered.contains("From: news@example.org"));
        assert!(rendered.contains("To: reader@example.org"));
        assert!(rendered.contains("Subject: Weekly digest"));
        assert!(rendered.contains("Content-Type: text/html; charset=utf-8"));
        assert!(rendered.contains("<p>fresh news</p>"));
    }

    #[test]
    fn test_unsubscribe_url_becomes_header() {
        let rendered = formatted(&queued(Some("https://example.org/unsubscribe/hash/ab12")));

        assert!(rendered.contains("List-Unsubscribe: <https://example.org/unsubscribe/hash/ab12>"));
    }

    #[test]
    fn test_no_unsubscribe_header_without_url() {
        let rendered = formatted(&queued(None));
        assert!(!rendered.contains("List-Unsubscribe"));
    }

    #[test]
    fn test_read_receipt_headers_point_at_sender() {
        let rendered = formatted(&queued(None));

        assert!(rendered.contains("Disposition-Notification-To: <news@example.org>"));
        assert!(rendered.contains("Return-Receipt-To: <news@example.org>"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let mut message = queued(None);
        message.recipient = "not an address".to_string();

        assert!(matches!(
            build_message(&message),
            Err(ComposeError::Address(_))
        ));
    }
}
