use std::sync::Arc;

use burner_common::message::Message;

use crate::r#trait::MailboxStore;

/// Read-only view of a store, handed to whatever presents mailboxes.
#[derive(Debug, Clone)]
pub struct Mailbox {
    store: Arc<dyn MailboxStore>,
}

impl Mailbox {
    pub fn new(store: Arc<dyn MailboxStore>) -> Self {
        Self { store }
    }

    /// Messages accepted since the store was created.
    pub async fn count_accepted(&self) -> u64 {
        self.store.count().await
    }

    /// Messages currently held for `alias`, oldest first.
    pub async fn find_by_alias(&self, alias: &str) -> Vec<Arc<Message>> {
        self.store.by_alias(alias).await
    }

    pub async fn find_by_id(&self, id: u64) -> Option<Arc<Message>> {
        self.store.by_id(id).await
    }
}

impl From<Arc<dyn MailboxStore>> for Mailbox {
    fn from(store: Arc<dyn MailboxStore>) -> Self {
        Self::new(store)
    }
}
