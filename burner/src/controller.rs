use std::{net::SocketAddr, sync::{Arc, LazyLock}};

use anyhow::Context;
use burner_common::{Signal, internal, logging, policy::DomainPolicy, tracing};
use burner_smtp::{Listener, SessionConfig, SmtpConfig};
use burner_store::{Mailbox, RetentionConfig, StoreConfig, Sweeper};
use burner_web::{AliasGenerator, AppState, WebConfig, WebServer};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Deserialize;
use tokio::{sync::broadcast, task::JoinHandle};

/// The whole service, as described by its configuration file.
///
/// ```ron
/// (
///     domain: "burner.example",
///     smtp: (listen: "[::]:25"),
///     policy: (accepted_domains: ["burner.example"], accept_subdomains: true),
///     store: Memory(capacity: 100000),
///     retention: (retention_hours: 4, sweep_interval_minutes: 5),
///     web: (listen: "[::]:80", random_alias: true),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Burner {
    /// Name this host announces itself as, and the domain shown to visitors.
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub policy: DomainPolicy,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub web: WebConfig,
}

fn default_domain() -> String {
    "localhost".to_string()
}

impl Default for Burner {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            smtp: SmtpConfig::default(),
            policy: DomainPolicy::default(),
            store: StoreConfig::default(),
            retention: RetentionConfig::default(),
            web: WebConfig::default(),
        }
    }
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

/// Handle on the started service.
#[derive(Debug)]
pub struct Running {
    smtp_address: SocketAddr,
    web_address: Option<SocketAddr>,
    shutdown: broadcast::Sender<Signal>,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    pub const fn smtp_address(&self) -> SocketAddr {
        self.smtp_address
    }

    pub const fn web_address(&self) -> Option<SocketAddr> {
        self.web_address
    }

    /// Broadcast [`Signal::Shutdown`] and wait for every task to finish.
    pub async fn stop(self) {
        if self.shutdown.send(Signal::Shutdown).is_err() {
            tracing::debug!("Every task had already stopped");
        }

        join_all(self.tasks).await;
    }
}

impl Burner {
    /// Check the settings that would only fail once traffic arrives.
    ///
    /// # Errors
    ///
    /// Names the first setting that is out of range.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.domain.trim().is_empty(), "domain must not be empty");
        anyhow::ensure!(self.smtp.timeout_secs > 0, "smtp.timeout_secs must be greater than zero");
        anyhow::ensure!(
            self.smtp.max_message_size > 0,
            "smtp.max_message_size must be greater than zero"
        );
        anyhow::ensure!(
            self.smtp.max_recipients > 0,
            "smtp.max_recipients must be greater than zero"
        );
        anyhow::ensure!(self.web.timeout_secs > 0, "web.timeout_secs must be greater than zero");
        self.retention.validate().context("Invalid retention settings")?;

        Ok(())
    }

    /// Bind every listener and spawn every task, all stopped through
    /// `shutdown`.
    ///
    /// Nothing is spawned unless every listener could be bound.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a store that cannot be set up, or an address
    /// that cannot be bound.
    pub async fn start(self, shutdown: broadcast::Sender<Signal>) -> anyhow::Result<Running> {
        self.validate()?;

        let retention = self.retention.retention();
        let store = self
            .store
            .clone()
            .into_store(retention)
            .context("Failed to set up the mailbox store")?;
        tracing::debug!(store = ?self.store, "Mailbox store ready");

        let listener = Listener::bind(SessionConfig {
            domain: self.domain.clone(),
            limits: self.smtp.clone(),
            policy: Arc::new(self.policy.clone()),
            store: Arc::clone(&store),
        })
        .await
        .context("Failed to start the SMTP listener")?;
        let smtp_address = listener.local_addr()?;

        let web = if self.web.enabled {
            let state = AppState {
                mailbox: Mailbox::new(Arc::clone(&store)),
                domain: self.domain.clone(),
                started_at: Utc::now(),
                retention_hours: self.retention.retention_hours,
                aliases: AliasGenerator::new(self.web.random_alias),
            };
            Some(
                WebServer::new(&self.web, state)
                    .await
                    .context("Failed to start the HTTP server")?,
            )
        } else {
            internal!(level = INFO, "HTTP interface disabled");
            None
        };
        let web_address = web.as_ref().map(WebServer::local_addr).transpose()?;

        let mut tasks = vec![tokio::spawn(listener.serve(shutdown.subscribe()))];

        if let Some(web) = web {
            let receiver = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                if let Err(err) = web.serve(receiver).await {
                    internal!(level = ERROR, "{err}");
                }
            }));
        }

        if store.requires_sweep() {
            let sweeper = Sweeper::new(
                Arc::clone(&store),
                retention,
                self.retention.sweep_interval(),
            );
            tasks.push(tokio::spawn(sweeper.serve(shutdown.subscribe())));
        } else {
            internal!(level = DEBUG, "Store expires messages itself, no sweeper started");
        }

        internal!(
            level = INFO,
            "Accepting mail for {} on {smtp_address}, keeping it for {} hours",
            self.domain,
            self.retention.retention_hours
        );

        Ok(Running {
            smtp_address,
            web_address,
            shutdown,
            tasks,
        })
    }

    /// Run this controller, and everything it controls, until the process is
    /// asked to stop.
    ///
    /// # Errors
    ///
    /// This function will return an error if the service could not be
    /// started.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let running = self.start(SHUTDOWN_BROADCAST.clone()).await?;
        let signalled = shutdown().await;

        internal!(level = INFO, "Shutting down...");

        tokio::select! {
            () = running.stop() => {}
            _ = tokio::signal::ctrl_c() => {
                internal!(level = WARN, "Forced shutdown, open sessions were not drained");
            }
        }

        signalled
    }
}
