use std::{collections::BTreeSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use burner_common::{
    address::local_part,
    message::{Message, MessageDraft},
};
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::{StoreError, r#trait::MailboxStore};

const SCAN_PAGE: usize = 100;

/// Message store backed by a Redis server
///
/// Every accepted message is written once per distinct recipient alias under
/// `"{alias}:{id}"`, as JSON, with the retention period as its TTL. Ids come
/// from `INCR` on a shared counter key, so several instances may share one
/// server.
///
/// Unlike [`MemoryMailbox`](crate::MemoryMailbox) there is no capacity bound:
/// messages leave only when their TTL runs out.
pub struct RedisMailbox {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
    counter_key: String,
    retention: Duration,
}

impl std::fmt::Debug for RedisMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMailbox")
            .field("counter_key", &self.counter_key)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl RedisMailbox {
    /// Create a store for the server at `url`. No connection is made until
    /// the first request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `url` is not a valid Redis URL or the
    /// retention period is shorter than a second.
    pub fn open(url: &str, counter_key: String, retention: Duration) -> crate::Result<Self> {
        if retention.as_secs() == 0 {
            return Err(StoreError::Config(
                "retention must be at least one second".to_string(),
            ));
        }

        let client = redis::Client::open(url).map_err(|e| {
            error!(url = %url, error = %e, "Failed to create Redis client");
            StoreError::Config(format!("Invalid Redis URL {url}: {e}"))
        })?;

        info!(url = %url, counter_key = %counter_key, "Redis store initialised");

        Ok(Self {
            client,
            connection: OnceCell::new(),
            counter_key,
            retention,
        })
    }

    async fn connection(&self) -> crate::Result<MultiplexedConnection> {
        self.connection
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await
            .cloned()
            .map_err(|e| {
                error!(error = %e, "Failed to connect to Redis");
                StoreError::Backend(format!("Failed to connect to Redis: {e}"))
            })
    }

    /// Push every message stored under a key matching `pattern` onto `found`.
    ///
    /// Entries that vanish between `SCAN` and `GET`, or that fail to decode,
    /// are skipped. On error `found` keeps whatever was read before it.
    async fn scan(
        &self,
        pattern: &str,
        limit: Option<usize>,
        found: &mut Vec<Message>,
    ) -> crate::Result<()> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_PAGE)
                .query_async(&mut conn)
                .await?;

            for key in keys {
                let Some(json) = redis::cmd("GET")
                    .arg(&key)
                    .query_async::<Option<String>>(&mut conn)
                    .await?
                else {
                    continue;
                };

                match serde_json::from_str::<Message>(&json) {
                    Ok(message) => found.push(message),
                    Err(e) => warn!(key = %key, error = %e, "Skipping undecodable message"),
                }

                if limit.is_some_and(|limit| found.len() >= limit) {
                    return Ok(());
                }
            }

            if next == 0 {
                return Ok(());
            }
            cursor = next;
        }
    }
}

/// Escape the glob metacharacters understood by `SCAN MATCH`.
fn escape_pattern(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A mailbox in arrival order. A scan that broke off part way still yields
/// what it read.
fn listing(alias: &str, mut messages: Vec<Message>, outcome: crate::Result<()>) -> Vec<Arc<Message>> {
    if let Err(e) = outcome {
        warn!(alias = %alias, found = messages.len(), error = %e, "Mailbox listing incomplete");
    }

    // SCAN order is arbitrary; ids follow arrival.
    messages.sort_by_key(|message| message.id);
    messages.into_iter().map(Arc::new).collect()
}

fn key(alias: &str, id: u64) -> String {
    format!("{alias}:{id}")
}

#[async_trait]
impl MailboxStore for RedisMailbox {
    async fn save(&self, draft: MessageDraft) -> crate::Result<u64> {
        let mut conn = self.connection().await?;

        let id: u64 = redis::cmd("INCR")
            .arg(&self.counter_key)
            .query_async(&mut conn)
            .await?;

        let message = draft.assign(id);
        let json = serde_json::to_string(&message)?;

        let aliases: BTreeSet<&str> = message
            .recipients
            .iter()
            .map(|recipient| local_part(recipient))
            .collect();

        for alias in aliases {
            redis::cmd("SET")
                .arg(key(alias, id))
                .arg(&json)
                .arg("EX")
                .arg(self.retention.as_secs())
                .query_async::<()>(&mut conn)
                .await
                .inspect_err(|e| {
                    error!(id, alias = %alias, error = %e, "Failed to store message in Redis");
                })?;
        }

        debug!(id, size = json.len(), "Stored message in Redis");

        Ok(id)
    }

    async fn by_alias(&self, alias: &str) -> Vec<Arc<Message>> {
        let pattern = format!("{}:*", escape_pattern(alias));
        let mut messages = Vec::new();
        let outcome = self.scan(&pattern, None, &mut messages).await;

        listing(alias, messages, outcome)
    }

    async fn by_id(&self, id: u64) -> Option<Arc<Message>> {
        let mut messages = Vec::with_capacity(1);
        if let Err(e) = self.scan(&format!("*:{id}"), Some(1), &mut messages).await {
            warn!(id, error = %e, "Failed to look up message");
        }

        messages.into_iter().next().map(Arc::new)
    }

    async fn count(&self) -> u64 {
        let Ok(mut conn) = self.connection().await else {
            return 0;
        };

        redis::cmd("GET")
            .arg(&self.counter_key)
            .query_async::<Option<u64>>(&mut conn)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read message counter");
                None
            })
            .unwrap_or_default()
    }

    async fn sweep(&self, _deadline: DateTime<Utc>) -> usize {
        0
    }

    fn requires_sweep(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use burner_common::message::Envelope;

    use super::*;

    #[test]
    fn keys() {
        assert_eq!(key("bob", 42), "bob:42");
        assert_eq!(escape_pattern("bob"), "bob");
        assert_eq!(escape_pattern("a*b?[c]"), "a\\*b\\?\\[c\\]");
        assert_eq!(escape_pattern("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn broken_scan_keeps_what_it_read() {
        let message = |id| {
            MessageDraft::parse(
                Envelope::new("a@x.test", vec!["bob@y.test".into()]),
                b"Subject: hi\r\n\r\nbody".to_vec(),
                Utc::now(),
            )
            .unwrap()
            .assign(id)
        };

        let listed = listing(
            "bob",
            vec![message(7), message(3)],
            Err(StoreError::Backend("connection reset".to_string())),
        );

        let ids: Vec<u64> = listed.iter().map(|message| message.id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert!(listing("bob", Vec::new(), Ok(())).is_empty());
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            RedisMailbox::open("not a url", "email_id".into(), Duration::from_secs(60)),
            Err(StoreError::Config(_))
        ));
        assert!(matches!(
            RedisMailbox::open("redis://127.0.0.1/", "email_id".into(), Duration::ZERO),
            Err(StoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_degrades_to_empty() {
        // Port 1 is never a Redis server.
        let store = RedisMailbox::open(
            "redis://127.0.0.1:1/",
            "email_id".into(),
            Duration::from_secs(60),
        )
        .unwrap();

        assert_eq!(store.count().await, 0);
        assert!(store.by_alias("bob").await.is_empty());
        assert!(store.by_id(1).await.is_none());
        assert_eq!(store.sweep(Utc::now()).await, 0);
        assert!(!store.requires_sweep());

        let draft = MessageDraft::parse(
            Envelope::new("a@x.test", vec!["bob@y.test".into()]),
            b"Subject: hi\r\n\r\nbody".to_vec(),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            store.save(draft).await,
            Err(StoreError::Backend(_))
        ));
    }
}
