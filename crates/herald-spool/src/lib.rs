//! File-backed message queue with at-least-once delivery semantics.
//!
//! Producers drop one JSON file per message into the spool directory;
//! the dispatch loop reads them back one at a time and deletes each
//! file only after its transport confirms the send.

mod error;
mod message;
mod spool;

pub use error::{SpoolError, SpoolResult};
pub use message::QueuedMessage;
pub use spool::{Spool, SpoolEntry, ENTRY_EXTENSION, PARTIAL_EXTENSION};
