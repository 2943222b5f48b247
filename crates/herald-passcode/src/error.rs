//! Passcode engine errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from passcode generation and validation.
#[derive(Error, Debug)]
pub enum PasscodeError {
    /// Secret file missing or unreadable.
    #[error("Cannot read secret file {path}: {source}")]
    SecretUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Secret is not a valid base32 string.
    #[error("Secret is not valid base32")]
    InvalidSecret,
}

/// Result type alias using PasscodeError.
pub type PasscodeResult<T> = Result<T, PasscodeError>;
