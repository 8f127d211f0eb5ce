pub mod config;
pub mod error;
pub mod memory;
pub mod query;
#[cfg(feature = "redis")]
pub mod redis;
pub mod sweeper;
pub mod r#trait;

pub use config::{RetentionConfig, StoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryMailbox;
pub use query::Mailbox;
#[cfg(feature = "redis")]
pub use self::redis::RedisMailbox;
pub use sweeper::Sweeper;
pub use r#trait::MailboxStore;
