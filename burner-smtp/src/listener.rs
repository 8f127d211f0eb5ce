use std::{io, net::SocketAddr, sync::Arc};

use burner_common::{Signal, error::ListenerError, internal, tracing};
use futures_util::future::join_all;
use tokio::{
    net::TcpListener,
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};

use crate::session::{Session, SessionConfig};

/// Accepts SMTP connections and runs a [`Session`] for each.
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    config: Arc<SessionConfig>,
}

impl Listener {
    /// Bind to the address in `config.limits.listen`.
    ///
    /// # Errors
    ///
    /// If the address cannot be bound.
    pub async fn bind(config: SessionConfig) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(&config.limits.listen)
            .await
            .map_err(|source| ListenerError::BindFailed {
                address: config.limits.listen.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// The address actually bound, useful when listening on port 0.
    ///
    /// # Errors
    ///
    /// If the socket has gone away.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires, then wait for every open
    /// session to say goodbye.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<Signal>) {
        let address = self
            .local_addr()
            .map_or_else(|_| self.config.limits.listen.clone(), |a| a.to_string());
        internal!(level = INFO, "SMTP listening on {address} for {}", self.config.domain);

        let mut sessions: Vec<JoinHandle<()>> = Vec::new();
        // Sessions subscribe here rather than resubscribing to `shutdown`, so
        // a session accepted just before the signal still hears it.
        let (stop, _) = broadcast::channel(1);

        loop {
            tokio::select! {
                biased;

                sig = shutdown.recv() => {
                    if matches!(sig, Err(RecvError::Lagged(_))) {
                        continue;
                    }

                    internal!(
                        level = INFO,
                        "SMTP listener {address} received shutdown signal, finishing {} sessions ...",
                        sessions.len()
                    );
                    if stop.send(Signal::Shutdown).is_err() {
                        tracing::debug!("No open sessions to stop");
                    }
                    join_all(sessions).await;
                    break;
                }

                connection = self.listener.accept() => {
                    let (stream, peer) = match connection {
                        Ok(connection) => connection,
                        Err(err) => {
                            internal!(level = WARN, "{}", ListenerError::AcceptFailed(err));
                            continue;
                        }
                    };

                    tracing::debug!("Connection received on {address} from {peer}");
                    sessions.retain(|session| !session.is_finished());

                    let session = Session::new(stream, peer, Arc::clone(&self.config));
                    let signal = stop.subscribe();
                    sessions.push(tokio::spawn(async move {
                        match session.run(signal).await {
                            Ok(()) => {}
                            Err(err) if err.is_shutdown() => internal!(level = DEBUG, "{peer}: {err}"),
                            Err(err) if err.is_client_error() => internal!(level = INFO, "{peer}: {err}"),
                            Err(err) => internal!(level = WARN, "{peer}: {err}"),
                        }
                    }));
                }
            }
        }

        internal!(level = INFO, "SMTP listener {address} stopped");
    }
}
