use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use herald_core::DispatchTiming;
use herald_credentials::CredentialManager;
use herald_spool::{Spool, SpoolError};
use herald_transport::Deliver;

use crate::timers::{TimerSet, CREDENTIAL_REFRESH_TIMER, RETRY_DELAY_TIMER};

/// Dispatch loop timing, resolved from the `[dispatch]` config table.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Pause between loop passes.
    pub tick: Duration,
    /// How long the whole queue stays paused after a failed delivery.
    pub retry_delay: Duration,
    /// Interval between credential refresh attempts.
    pub credential_refresh: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            retry_delay: Duration::from_secs(30 * 60),
            credential_refresh: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&DispatchTiming> for DispatchConfig {
    fn from(timing: &DispatchTiming) -> Self {
        Self {
            tick: Duration::from_secs(timing.tick_secs),
            retry_delay: Duration::from_secs(timing.retry_delay_mins * 60),
            credential_refresh: Duration::from_secs(timing.credential_refresh_mins * 60),
        }
    }
}

/// What one loop pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The queue was empty.
    Idle,
    /// One entry was delivered and removed.
    Delivered,
    /// The delivery attempt failed; the queue is now paused.
    Failed,
    /// The retry delay is still running; nothing was attempted.
    Deferred,
    /// The first entry could not be parsed.
    Malformed,
}

/// Single consumer of the spool.
///
/// Each tick delivers at most one message. A failed attempt arms the
/// retry-delay timer, which pauses every entry in the queue, not just
/// the one that failed; bulk mail has no per-message urgency and one
/// failure usually means the relay or credentials are unhappy.
///
/// Credential refresh runs on its own timer, independent of queue
/// activity, so an idle engine still holds a fresh token when the next
/// batch arrives.
pub struct DispatchLoop<T> {
    spool: Spool,
    transport: T,
    credentials: Option<CredentialManager>,
    config: DispatchConfig,
    timers: TimerSet,
    running: Arc<AtomicBool>,
}

impl<T: Deliver> DispatchLoop<T> {
    pub fn new(
        spool: Spool,
        transport: T,
        credentials: Option<CredentialManager>,
        config: DispatchConfig,
    ) -> Self {
        let mut timers = TimerSet::new();
        // Credentials are primed by the caller before the loop starts;
        // the first in-loop refresh happens a full interval later.
        if credentials.is_some() {
            timers.reset(CREDENTIAL_REFRESH_TIMER, config.credential_refresh);
        }
        Self {
            spool,
            transport,
            credentials,
            config,
            timers,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag that keeps [`DispatchLoop::run`] going. Clear it to stop
    /// the loop after the current pass.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Runs until the running flag is cleared.
    pub async fn run(mut self) {
        info!(
            transport = %self.transport.kind(),
            spool = %self.spool.dir().display(),
            tick = ?self.config.tick,
            "Dispatch loop started"
        );
        while self.running.load(Ordering::SeqCst) {
            self.tick().await;
            tokio::time::sleep(self.config.tick).await;
        }
        info!("Dispatch loop stopped");
    }

    /// One loop pass: refresh credentials if due, then move at most
    /// one message.
    pub async fn tick(&mut self) -> TickOutcome {
        self.refresh_credentials_if_due().await;
        self.pump_one().await
    }

    async fn refresh_credentials_if_due(&mut self) {
        let Some(manager) = &self.credentials else {
            return;
        };
        if !self.timers.is_elapsed(CREDENTIAL_REFRESH_TIMER) {
            return;
        }
        // Rearm first so the cadence stays fixed whatever the outcome.
        self.timers
            .reset(CREDENTIAL_REFRESH_TIMER, self.config.credential_refresh);
        if let Err(e) = manager.ensure_fresh().await {
            warn!(error = %e, "Credential refresh failed");
        }
    }

    async fn pump_one(&mut self) -> TickOutcome {
        if !self.timers.is_elapsed(RETRY_DELAY_TIMER) {
            return TickOutcome::Deferred;
        }

        let entry = match self.spool.peek_one() {
            Ok(Some(entry)) => entry,
            Ok(None) => return TickOutcome::Idle,
            Err(SpoolError::Malformed { path, detail }) => {
                warn!(
                    path = %path.display(),
                    detail = %detail,
                    "Malformed queue entry"
                );
                if let Err(e) = self.spool.quarantine(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to quarantine entry");
                }
                return TickOutcome::Malformed;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read queue");
                return TickOutcome::Idle;
            }
        };

        match self.transport.send(entry.message()).await {
            Ok(()) => {
                self.timers.clear(RETRY_DELAY_TIMER);
                info!(
                    recipient = %entry.message().recipient,
                    transport = %self.transport.kind(),
                    "Message delivered"
                );
                if let Err(e) = self.spool.remove(&entry) {
                    // The entry will be sent again; at-least-once allows it.
                    warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Delivered but could not remove queue entry"
                    );
                }
                TickOutcome::Delivered
            }
            Err(e) => {
                warn!(
                    transport = %e.transport,
                    reason = %e.reason,
                    retry_delay = ?self.config.retry_delay,
                    "Delivery failed, pausing queue"
                );
                self.timers.reset(RETRY_DELAY_TIMER, self.config.retry_delay);
                TickOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use herald_spool::QueuedMessage;
    use herald_transport::{SendError, TransportKind};

    #[derive(Clone, Default)]
    struct MockTransport {
        failing: Arc<AtomicBool>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl MockTransport {
        fn sent_recipients(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl Deliver for MockTransport {
        async fn send(&self, message: &QueuedMessage) -> Result<(), SendError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SendError::new(TransportKind::Smtp, "mock failure"));
            }
            self.sent.lock().unwrap().push(message.recipient.clone());
            Ok(())
        }

        fn kind(&self) -> TransportKind {
            TransportKind::Smtp
        }
    }

    fn message(recipient: &str) -> QueuedMessage {
        QueuedMessage {
            text: "<p>body</p>".to_string(),
            subject: "subject".to_string(),
            sender: "news@example.org".to_string(),
            recipient: recipient.to_string(),
            unsubscribe_url: None,
        }
    }

    fn quick_config() -> DispatchConfig {
        DispatchConfig {
            tick: Duration::from_millis(1),
            ..DispatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_tick_delivers_and_removes_one_entry() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        spool.enqueue(&message("a@example.org")).unwrap();
        let transport = MockTransport::default();
        let mut dispatch =
            DispatchLoop::new(spool.clone(), transport.clone(), None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Delivered);

        assert_eq!(spool.pending_count(), 0);
        assert_eq!(transport.sent_recipients(), vec!["a@example.org"]);
    }

    #[tokio::test]
    async fn test_at_most_one_delivery_per_tick() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        spool.enqueue(&message("a@example.org")).unwrap();
        spool.enqueue(&message("b@example.org")).unwrap();
        let transport = MockTransport::default();
        let mut dispatch =
            DispatchLoop::new(spool.clone(), transport.clone(), None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Delivered);
        assert_eq!(spool.pending_count(), 1);

        assert_eq!(dispatch.tick().await, TickOutcome::Delivered);
        assert_eq!(dispatch.tick().await, TickOutcome::Idle);
        assert_eq!(transport.sent_recipients().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_queue_is_idle() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        let transport = MockTransport::default();
        let mut dispatch = DispatchLoop::new(spool, transport.clone(), None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Idle);
        assert!(transport.sent_recipients().is_empty());
    }

    #[tokio::test]
    async fn test_failure_pauses_the_whole_queue() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        spool.enqueue(&message("a@example.org")).unwrap();
        spool.enqueue(&message("b@example.org")).unwrap();
        let transport = MockTransport::default();
        transport.set_failing(true);
        let mut dispatch =
            DispatchLoop::new(spool.clone(), transport.clone(), None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Failed);

        // Both entries stay put and no further attempt is made while
        // the delay runs, the healthy entry included.
        transport.set_failing(false);
        assert_eq!(dispatch.tick().await, TickOutcome::Deferred);
        assert_eq!(dispatch.tick().await, TickOutcome::Deferred);
        assert_eq!(spool.pending_count(), 2);
        assert!(transport.sent_recipients().is_empty());
    }

    #[tokio::test]
    async fn test_queue_resumes_after_retry_delay() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        spool.enqueue(&message("a@example.org")).unwrap();
        let transport = MockTransport::default();
        transport.set_failing(true);
        let config = DispatchConfig {
            retry_delay: Duration::ZERO,
            ..quick_config()
        };
        let mut dispatch = DispatchLoop::new(spool.clone(), transport.clone(), None, config);

        assert_eq!(dispatch.tick().await, TickOutcome::Failed);
        assert_eq!(spool.pending_count(), 1);

        transport.set_failing(false);
        assert_eq!(dispatch.tick().await, TickOutcome::Delivered);
        assert_eq!(spool.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let dead = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), Some(dead.path().to_path_buf()));
        std::fs::write(dir.path().join("broken.json"), b"not json").unwrap();
        let transport = MockTransport::default();
        let mut dispatch =
            DispatchLoop::new(spool.clone(), transport.clone(), None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Malformed);

        assert_eq!(spool.pending_count(), 0);
        assert!(dead.path().join("broken.json").exists());
        assert_eq!(dispatch.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_malformed_entry_without_dead_letter_stays() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, b"not json").unwrap();
        let transport = MockTransport::default();
        let mut dispatch = DispatchLoop::new(spool, transport, None, quick_config());

        assert_eq!(dispatch.tick().await, TickOutcome::Malformed);
        assert!(bad.exists());
        assert_eq!(dispatch.tick().await, TickOutcome::Malformed);
    }

    #[tokio::test]
    async fn test_failed_refresh_does_not_stop_dispatch() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        spool.enqueue(&message("a@example.org")).unwrap();
        let transport = MockTransport::default();
        let manager = CredentialManager::new(dir.path().join("missing-credentials.json"));
        *manager.token_handle().write().await = Some("stale".to_string());
        let handle = manager.token_handle();
        let config = DispatchConfig {
            credential_refresh: Duration::ZERO,
            ..quick_config()
        };
        let mut dispatch = DispatchLoop::new(spool, transport, Some(manager), config);

        assert_eq!(dispatch.tick().await, TickOutcome::Delivered);
        assert!(handle.read().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_waits_for_its_interval() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        let transport = MockTransport::default();
        let manager = CredentialManager::new(dir.path().join("missing-credentials.json"));
        *manager.token_handle().write().await = Some("primed".to_string());
        let handle = manager.token_handle();
        let mut dispatch = DispatchLoop::new(spool, transport, Some(manager), quick_config());

        dispatch.tick().await;

        // The 30 minute interval has not elapsed, so the primed token
        // was not touched.
        assert_eq!(handle.read().await.as_deref(), Some("primed"));
    }

    #[tokio::test]
    async fn test_run_stops_when_flag_cleared() {
        let dir = TempDir::new().unwrap();
        let spool = Spool::new(dir.path(), None);
        let transport = MockTransport::default();
        let dispatch = DispatchLoop::new(spool, transport, None, quick_config());
        let running = dispatch.running_flag();

        let task = tokio::spawn(dispatch.run());
        running.store(false, Ordering::SeqCst);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop should stop promptly")
            .unwrap();
    }
}
