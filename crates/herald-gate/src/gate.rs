use tracing::{info, warn};

use herald_passcode::validate;
use herald_spool::{QueuedMessage, Spool};

use crate::book::AddressBook;
use crate::error::{GateError, GateResult};
use crate::render::{Render, RenderContext};

/// One batch submission: send this template to every subscriber.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Six-digit passcode proving the caller holds the shared secret.
    pub passcode: String,
    pub subject: String,
    /// Template reference handed through to the renderer.
    pub template: String,
}

/// Admission control in front of the queue.
///
/// A batch is all-or-nothing up to the queue boundary: the passcode is
/// checked first, then every body is rendered, and only then are the
/// entries written. A bad passcode or a render failure therefore
/// leaves the queue untouched.
pub struct ScheduleGate<B, R> {
    secret: String,
    sender: String,
    spool: Spool,
    book: B,
    renderer: R,
    site_url: Option<String>,
    list_unsubscribe: bool,
}

impl<B: AddressBook, R: Render> ScheduleGate<B, R> {
    pub fn new(
        secret: impl Into<String>,
        sender: impl Into<String>,
        spool: Spool,
        book: B,
        renderer: R,
    ) -> Self {
        Self {
            secret: secret.into(),
            sender: sender.into(),
            spool,
            book,
            renderer,
            site_url: None,
            list_unsubscribe: false,
        }
    }

    /// Enables per-recipient unsubscribe links under `site_url`.
    pub fn with_unsubscribe_links(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self.list_unsubscribe = true;
        self
    }

    /// Validates the passcode and queues one message per subscriber.
    /// Returns how many entries were written; delivery happens later
    /// in the dispatch loop.
    pub fn schedule(&self, request: &BatchRequest) -> GateResult<usize> {
        if !validate(&self.secret, &request.passcode)? {
            warn!("Rejected batch: incorrect passcode");
            return Err(GateError::Authorization);
        }

        let recipients = self.book.read_all()?;

        let mut batch = Vec::with_capacity(recipients.len());
        for (id, address) in &recipients {
            let unsubscribe_url = self.unsubscribe_url(id);
            let context = RenderContext {
                unsubscribe_url: unsubscribe_url.clone(),
            };
            let text = self.renderer.render(&request.template, &context)?;
            batch.push(QueuedMessage {
                text,
                subject: request.subject.clone(),
                sender: self.sender.clone(),
                recipient: address.clone(),
                unsubscribe_url,
            });
        }

        for message in &batch {
            self.spool.enqueue(message)?;
        }

        info!(count = batch.len(), subject = %request.subject, "Batch scheduled");
        Ok(batch.len())
    }

    fn unsubscribe_url(&self, recipient_id: &str) -> Option<String> {
        if !self.list_unsubscribe {
            return None;
        }
        self.site_url
            .as_ref()
            .map(|site| format!("{site}/unsubscribe/hash/{recipient_id}"))
    }
}
