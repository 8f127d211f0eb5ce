//! HTTP interface configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WebConfig {
    /// Enable or disable the HTTP interface
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind the HTTP interface
    ///
    /// Common values:
    /// - `[::]:80` (IPv6 any address, the default)
    /// - `127.0.0.1:8080` (localhost only, unprivileged port)
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Suggest a random alias instead of the literal `alias`.
    #[serde(default)]
    pub random_alias: bool,

    /// Seconds a request may take before it is answered with a timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen() -> String {
    "[::]:80".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen: default_listen(),
            random_alias: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl WebConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
