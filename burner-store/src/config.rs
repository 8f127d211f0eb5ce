use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{MemoryMailbox, StoreError, r#trait::MailboxStore};

/// Which store holds delivered messages
///
/// In-process store, oldest messages pushed out past `capacity`:
/// ```ron
/// store: Memory(
///     capacity: 100000,
/// ),
/// ```
///
/// Redis, with the retention period applied as a TTL:
/// ```ron
/// store: Redis(
///     url: "redis://127.0.0.1:6379/0",
/// ),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum StoreConfig {
    Memory {
        #[serde(default = "default_capacity")]
        capacity: usize,
    },
    #[cfg(feature = "redis")]
    Redis {
        url: String,
        #[serde(default = "default_counter_key")]
        counter_key: String,
    },
}

const fn default_capacity() -> usize {
    100_000
}

#[cfg(feature = "redis")]
fn default_counter_key() -> String {
    "email_id".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory {
            capacity: default_capacity(),
        }
    }
}

impl StoreConfig {
    /// Build the configured store.
    ///
    /// `retention` is only used by stores that expire entries themselves.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for a zero capacity or a store that
    /// cannot be set up from the given parameters.
    #[cfg_attr(not(feature = "redis"), allow(unused_variables))]
    pub fn into_store(self, retention: Duration) -> crate::Result<Arc<dyn MailboxStore>> {
        match self {
            Self::Memory { capacity } => {
                let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
                    StoreError::Config("capacity must be greater than zero".to_string())
                })?;
                Ok(Arc::new(MemoryMailbox::new(capacity)))
            }
            #[cfg(feature = "redis")]
            Self::Redis { url, counter_key } => Ok(Arc::new(crate::RedisMailbox::open(
                &url,
                counter_key,
                retention,
            )?)),
        }
    }
}

/// How long messages are kept, and how often the in-process store is swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,
}

const fn default_retention_hours() -> u64 {
    4
}

const fn default_sweep_interval_minutes() -> u64 {
    5
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

impl RetentionConfig {
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if either period is zero.
    pub fn validate(&self) -> crate::Result<()> {
        if self.retention_hours == 0 {
            return Err(StoreError::Config(
                "retention_hours must be greater than zero".to_string(),
            ));
        }

        if self.sweep_interval_minutes == 0 {
            return Err(StoreError::Config(
                "sweep_interval_minutes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(60 * 60))
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.saturating_mul(60))
    }
}
