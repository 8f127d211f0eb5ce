use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use burner_common::message::{Message, MessageDraft};
use chrono::{DateTime, Utc};

/// Where delivered messages are kept until they expire.
///
/// Reads never fail: a backend that cannot answer logs the problem and
/// reports nothing found, so that a storage outage never blocks the query
/// side.
#[async_trait]
pub trait MailboxStore: Send + Sync + Debug {
    /// Assign the next id to `draft` and keep it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not store the message. The id
    /// counter may still have advanced.
    async fn save(&self, draft: MessageDraft) -> crate::Result<u64>;

    /// Every held message with a recipient whose local-part is exactly
    /// `alias`, oldest first.
    async fn by_alias(&self, alias: &str) -> Vec<Arc<Message>>;

    async fn by_id(&self, id: u64) -> Option<Arc<Message>>;

    /// Number of messages ever accepted, including evicted and expired ones.
    async fn count(&self) -> u64;

    /// Drop every message received strictly before `deadline`, returning how
    /// many went.
    async fn sweep(&self, deadline: DateTime<Utc>) -> usize;

    /// Whether expiry relies on [`MailboxStore::sweep`] being called
    /// periodically, as opposed to the backend expiring entries itself.
    fn requires_sweep(&self) -> bool {
        true
    }
}
