//! Periodic expiry for stores that do not expire entries on their own.

use std::{sync::Arc, time::Duration};

use burner_common::{Signal, internal};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::r#trait::MailboxStore;

#[derive(Debug, Clone)]
pub struct Sweeper {
    store: Arc<dyn MailboxStore>,
    retention: TimeDelta,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<dyn MailboxStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
            interval,
        }
    }

    /// Remove everything older than the retention period as of `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> usize {
        let deadline = now
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let removed = self.store.sweep(deadline).await;

        if removed > 0 {
            info!(removed, %deadline, "Removed expired messages");
        } else {
            debug!(%deadline, "No expired messages");
        }

        removed
    }

    /// Sweep every `interval` until told to shut down.
    ///
    /// The first sweep happens one interval after start. A sweep in progress
    /// when the signal arrives is finished first; anything it misses is
    /// picked up by the next run.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(level = INFO, "Sweeper running every {:?}", self.interval);

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Skip the first tick to avoid immediate execution
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep_once(Utc::now()).await;
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) | Err(RecvError::Closed) => {
                            internal!(level = INFO, "Sweeper received shutdown signal");
                            break;
                        }
                        Err(RecvError::Lagged(_)) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroUsize;

    use burner_common::message::{Envelope, MessageDraft};

    use super::*;
    use crate::MemoryMailbox;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    async fn store_with_ages(ages: &[TimeDelta]) -> Arc<MemoryMailbox> {
        let store = Arc::new(MemoryMailbox::new(NonZeroUsize::new(16).unwrap()));
        let now = Utc::now();

        for age in ages {
            let draft = MessageDraft::parse(
                Envelope::new("a@x.test", vec!["bob@y.test".to_string()]),
                b"Subject: old\r\n\r\n".to_vec(),
                now - *age,
            )
            .unwrap();
            store.save(draft).await.unwrap();
        }

        store
    }

    #[tokio::test]
    async fn sweep_once_uses_retention() {
        let store = store_with_ages(&[
            TimeDelta::hours(5),
            TimeDelta::hours(3),
            TimeDelta::zero(),
        ])
        .await;
        let sweeper = Sweeper::new(store.clone(), 4 * HOUR, HOUR);

        assert_eq!(sweeper.sweep_once(Utc::now()).await, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(sweeper.sweep_once(Utc::now()).await, 0);

        assert_eq!(
            sweeper.sweep_once(Utc::now() + TimeDelta::hours(2)).await,
            1
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn huge_retention_never_underflows() {
        let store = store_with_ages(&[TimeDelta::hours(1)]).await;
        let sweeper = Sweeper::new(store.clone(), Duration::MAX, HOUR);

        assert_eq!(sweeper.sweep_once(Utc::now()).await, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn serves_until_shutdown() {
        let store = store_with_ages(&[TimeDelta::hours(10), TimeDelta::zero()]).await;
        let sweeper = Sweeper::new(store.clone(), 4 * HOUR, Duration::from_secs(60));

        let (sender, receiver) = broadcast::channel(4);
        let task = tokio::spawn(sweeper.serve(receiver));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(store.len(), 1);

        sender.send(Signal::Shutdown).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_sender_is_gone() {
        let store = store_with_ages(&[]).await;
        let sweeper = Sweeper::new(store, HOUR, HOUR);

        let (sender, receiver) = broadcast::channel(1);
        let task = tokio::spawn(sweeper.serve(receiver));
        drop(sender);

        task.await.unwrap();
    }
}
