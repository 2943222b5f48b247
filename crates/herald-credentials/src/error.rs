use thiserror::Error;

/// Errors raised while loading or refreshing API credentials.
///
/// None of these are fatal to the engine: the dispatch loop logs them
/// and tries again on the next refresh interval, while sends that need
/// a token fail fast in the meantime.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// No usable access token and no way to obtain one right now.
    #[error("Credentials unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token refresh request failed: {0}")]
    Refresh(#[from] reqwest::Error),
}

pub type CredentialsResult<T> = Result<T, CredentialsError>;
