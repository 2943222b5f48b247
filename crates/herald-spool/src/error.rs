use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by spool operations.
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A queue entry that exists on disk but cannot be read back as a
    /// message. The file is left in place so an operator can inspect it.
    #[error("Malformed queue entry {}: {detail}", path.display())]
    Malformed { path: PathBuf, detail: String },
}

pub type SpoolResult<T> = Result<T, SpoolError>;
