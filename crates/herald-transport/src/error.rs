use std::fmt;

use thiserror::Error;

/// Which delivery mechanism produced an error or is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Smtp,
    Api,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp => write!(f, "SMTP"),
            Self::Api => write!(f, "API"),
        }
    }
}

/// A failed delivery attempt.
///
/// Always transient: the entry stays queued and the dispatch loop
/// retries after its delay. The reason is a display string because the
/// loop only ever logs it.
#[derive(Debug, Clone, Error)]
#[error("Sending error via {transport}: {reason}")]
pub struct SendError {
    pub transport: TransportKind,
    pub reason: String,
}

impl SendError {
    pub fn new(transport: TransportKind, reason: impl Into<String>) -> Self {
        Self {
            transport,
            reason: reason.into(),
        }
    }
}

/// Errors raised while constructing a transport at startup. These are
/// fatal; a transport that cannot be built means the configuration is
/// unusable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Configuration section for the {0} transport is missing")]
    MissingSection(TransportKind),

    #[error("Failed to initialize SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
