use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SpoolError, SpoolResult};
use crate::message::QueuedMessage;

/// Extension carried by finished queue entries.
pub const ENTRY_EXTENSION: &str = "json";

/// Extension used while an entry is still being written. Entries are
/// written under this name first and renamed into place, so a reader
/// never observes a half-written file.
pub const PARTIAL_EXTENSION: &str = "tmp";

/// File-backed delivery queue.
///
/// One file per pending message, named with a random id so concurrent
/// producers never collide. Entries are only removed after the caller
/// confirms delivery, which makes the queue at-least-once: a crash
/// between send and remove re-delivers on restart.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
    dead_letter_dir: Option<PathBuf>,
}

/// A queue entry handed out by [`Spool::peek_one`]. Holds the parsed
/// message together with the path it was read from, so the same file
/// can later be removed or quarantined.
#[derive(Debug, Clone)]
pub struct SpoolEntry {
    path: PathBuf,
    message: QueuedMessage,
}

impl SpoolEntry {
    pub fn message(&self) -> &QueuedMessage {
        &self.message
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>, dead_letter_dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            dead_letter_dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists a message as a new queue entry and returns its path.
    ///
    /// The entry is written to a partial file first and renamed into
    /// place, so it becomes visible to readers in one step.
    pub fn enqueue(&self, message: &QueuedMessage) -> SpoolResult<PathBuf> {
        let id = Uuid::new_v4().simple().to_string();
        let partial = self.dir.join(format!("{id}.{PARTIAL_EXTENSION}"));
        let path = self.dir.join(format!("{id}.{ENTRY_EXTENSION}"));

        let body = serde_json::to_vec(message).map_err(|e| SpoolError::Malformed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        fs::write(&partial, body)?;
        fs::rename(&partial, &path)?;

        debug!(
            entry = %id,
            recipient = %message.recipient,
            "Enqueued message"
        );
        Ok(path)
    }

    /// Returns the first pending entry, or `None` when the queue is
    /// empty or its directory cannot be enumerated.
    ///
    /// "First" means first in directory enumeration order; no ordering
    /// across entries is promised. An entry that cannot be read back is
    /// reported as [`SpoolError::Malformed`] and left on disk.
    pub fn peek_one(&self) -> SpoolResult<Option<SpoolEntry>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to enumerate spool directory"
                );
                return Ok(None);
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION)
            {
                continue;
            }
            let raw = fs::read_to_string(&path).map_err(|e| SpoolError::Malformed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
            let message =
                serde_json::from_str(&raw).map_err(|e| SpoolError::Malformed {
                    path: path.clone(),
                    detail: e.to_string(),
                })?;
            return Ok(Some(SpoolEntry { path, message }));
        }
        Ok(None)
    }

    /// Deletes a delivered entry. Only call this after the transport
    /// has confirmed the send.
    pub fn remove(&self, entry: &SpoolEntry) -> SpoolResult<()> {
        fs::remove_file(&entry.path)?;
        debug!(path = %entry.path.display(), "Removed delivered entry");
        Ok(())
    }

    /// Moves an unreadable entry into the dead-letter directory so it
    /// stops blocking the queue. Returns the new path, or `None` when
    /// no dead-letter directory is configured and the file stays put.
    pub fn quarantine(&self, path: &Path) -> SpoolResult<Option<PathBuf>> {
        let Some(dead_letter_dir) = &self.dead_letter_dir else {
            return Ok(None);
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| SpoolError::Malformed {
                path: path.to_path_buf(),
                detail: "entry path has no file name".to_string(),
            })?;
        let target = dead_letter_dir.join(file_name);
        fs::rename(path, &target)?;
        info!(
            from = %path.display(),
            to = %target.display(),
            "Quarantined malformed entry"
        );
        Ok(Some(target))
    }

    /// Number of pending entries, zero when the directory cannot be
    /// enumerated.
    pub fn pending_count(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .flatten()
            .filter(|entry| {
                let path = entry.path();
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION)
            })
            .count()
    }
}
