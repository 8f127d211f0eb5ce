use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use burner_common::message::{Message, MessageDraft};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::r#trait::MailboxStore;

/// In-process, bounded message store
///
/// Messages are kept in arrival order. Once `capacity` messages are held,
/// each new message pushes the oldest one out.
///
/// # Concurrency
/// Writers (`save`, `sweep`) take the write lock for an append/evict or a
/// filter and nothing else. Readers take the read lock only long enough to
/// clone out the `Arc`s they match, so a scan sees a consistent snapshot and
/// never holds up a writer for longer than the scan itself.
///
/// # Ids
/// Ids start at 1 and the counter is never reset, so `count` keeps counting
/// past evictions and sweeps.
#[derive(Debug)]
pub struct MemoryMailbox {
    inner: RwLock<Inner>,
    capacity: NonZeroUsize,
}

#[derive(Debug, Default)]
struct Inner {
    messages: VecDeque<Arc<Message>>,
    issued: u64,
}

impl MemoryMailbox {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                messages: VecDeque::with_capacity(capacity.get().min(1024)),
                issued: 0,
            }),
            capacity,
        }
    }

    /// Number of messages currently held
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot<F>(&self, mut keep: F) -> Vec<Arc<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .iter()
            .filter(|message| keep(message))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MailboxStore for MemoryMailbox {
    async fn save(&self, draft: MessageDraft) -> crate::Result<u64> {
        let mut inner = self.inner.write()?;

        inner.issued += 1;
        let id = inner.issued;

        if inner.messages.len() >= self.capacity.get() {
            if let Some(evicted) = inner.messages.pop_front() {
                debug!(id = evicted.id, "Evicted oldest message");
            }
        }

        inner.messages.push_back(Arc::new(draft.assign(id)));

        Ok(id)
    }

    async fn by_alias(&self, alias: &str) -> Vec<Arc<Message>> {
        self.snapshot(|message| message.is_for(alias))
    }

    async fn by_id(&self, id: u64) -> Option<Arc<Message>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .iter()
            .find(|message| message.id == id)
            .cloned()
    }

    async fn count(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .issued
    }

    async fn sweep(&self, deadline: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let before = inner.messages.len();
        inner
            .messages
            .retain(|message| message.received_at >= deadline);

        before - inner.messages.len()
    }
}
