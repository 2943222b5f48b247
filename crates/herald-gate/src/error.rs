use thiserror::Error;

use crate::book::BookError;
use crate::render::RenderError;
use herald_passcode::PasscodeError;
use herald_spool::SpoolError;

/// Errors raised while admitting a batch request.
#[derive(Debug, Error)]
pub enum GateError {
    /// The submitted passcode did not match the current one. The whole
    /// batch is rejected; nothing was enqueued.
    #[error("Authorization error: passcode rejected")]
    Authorization,

    #[error("Passcode error: {0}")]
    Passcode(#[from] PasscodeError),

    #[error("Address book error: {0}")]
    Book(#[from] BookError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Queue error: {0}")]
    Spool(#[from] SpoolError),
}

pub type GateResult<T> = Result<T, GateError>;
