//! Subscriber address book.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address book file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type BookResult<T> = Result<T, BookError>;

/// Recipient source for the scheduling gate.
///
/// Addresses are keyed by an opaque id that is stable for the address
/// and safe to put in an unsubscribe URL.
pub trait AddressBook {
    /// All subscribed addresses, keyed by id.
    fn read_all(&self) -> BookResult<BTreeMap<String, String>>;

    /// Removes the address with the given id and returns it, or `None`
    /// when no such record exists. Used by the unsubscribe flow.
    fn remove_by_id(&self, id: &str) -> BookResult<Option<String>>;
}

/// The id for an address: lowercase hex SHA-256 of the normalized form.
pub fn address_id(email: &str) -> String {
    let digest = Sha256::digest(normalize(email).as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct BookRecord {
    email: String,
    hash: String,
}

/// Address book persisted as a JSON array of `{email, hash}` records.
///
/// A missing file reads as an empty book; writes go through a temp
/// file and rename like the spool's.
#[derive(Debug, Clone)]
pub struct FileAddressBook {
    path: PathBuf,
}

impl FileAddressBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds an address, normalized first. Returns `false` when the
    /// address was already subscribed; the book is unchanged then.
    pub fn add(&self, email: &str) -> BookResult<bool> {
        let email = normalize(email);
        let mut records = self.read_records()?;
        if records.iter().any(|r| r.email == email) {
            debug!(id = %address_id(&email), "Address already subscribed");
            return Ok(false);
        }
        records.push(BookRecord {
            hash: address_id(&email),
            email,
        });
        self.write_records(&records)?;
        info!(total = records.len(), "Subscribed address");
        Ok(true)
    }

    fn read_records(&self) -> BookResult<Vec<BookRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| BookError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn write_records(&self, records: &[BookRecord]) -> BookResult<()> {
        let json = serde_json::to_vec_pretty(records).map_err(|source| BookError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl AddressBook for FileAddressBook {
    fn read_all(&self) -> BookResult<BTreeMap<String, String>> {
        let records = self.read_records()?;
        debug!(count = records.len(), "Loaded address book");
        Ok(records
            .into_iter()
            .map(|record| (record.hash, record.email))
            .collect())
    }

    fn remove_by_id(&self, id: &str) -> BookResult<Option<String>> {
        let mut records = self.read_records()?;
        let Some(position) = records.iter().position(|r| r.hash == id) else {
            return Ok(None);
        };
        let removed = records.remove(position);
        self.write_records(&records)?;
        info!(remaining = records.len(), "Unsubscribed address");
        Ok(Some(removed.email))
    }
}
