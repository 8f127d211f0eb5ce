use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits and address for the SMTP receiver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SmtpConfig {
    /// Address to accept connections on
    ///
    /// Common values:
    /// - `[::]:25` (IPv6 any address, the default)
    /// - `0.0.0.0:2525` (IPv4 any address, unprivileged port)
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Seconds to wait for the next line from a client before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest message accepted after `DATA`, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Most accepted recipients per message.
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
}

fn default_listen() -> String {
    "[::]:25".to_string()
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_max_message_size() -> usize {
    5 * 1024 * 1024
}

const fn default_max_recipients() -> usize {
    10
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            timeout_secs: default_timeout_secs(),
            max_message_size: default_max_message_size(),
            max_recipients: default_max_recipients(),
        }
    }
}

impl SmtpConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: SmtpConfig = ron::from_str("()").unwrap();

        assert_eq!(config, SmtpConfig::default());
        assert_eq!(config.listen, "[::]:25");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_message_size, 5_242_880);
        assert_eq!(config.max_recipients, 10);
    }

    #[test]
    fn overrides() {
        let config: SmtpConfig =
            ron::from_str(r#"(listen: "127.0.0.1:2525", max_recipients: 2)"#).unwrap();

        assert_eq!(config.listen, "127.0.0.1:2525");
        assert_eq!(config.max_recipients, 2);
        assert_eq!(config.timeout_secs, 60);
    }
}
