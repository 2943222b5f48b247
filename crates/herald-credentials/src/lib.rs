//! Cached OAuth credentials for the API transport.
//!
//! Reads the authorized-user JSON cache, refreshes the access token
//! against the authorization server when it expires, and publishes the
//! current token through a shared handle. Every failure here is
//! non-fatal; the engine keeps running and retries later.

mod error;
mod manager;
mod store;

pub use error::{CredentialsError, CredentialsResult};
pub use manager::{CredentialManager, TokenHandle};
pub use store::{StoredCredentials, EXPIRY_LEEWAY_SECS};
