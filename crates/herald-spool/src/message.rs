use serde::{Deserialize, Serialize};

/// One message awaiting delivery, exactly as persisted on disk.
///
/// Every entry already carries the final recipient and rendered body.
/// Nothing about the original batch request survives into the spool, so
/// a restart can resume delivery from the files alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Rendered HTML body.
    pub text: String,
    pub subject: String,
    /// Address placed in the `From` header.
    pub sender: String,
    /// Address placed in the `To` header.
    pub recipient: String,
    /// Per-recipient unsubscribe link, when the feature is enabled.
    #[serde(default)]
    pub unsubscribe_url: Option<String>,
}
