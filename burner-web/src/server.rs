//! HTTP server for the mailbox views

use std::{io, net::SocketAddr};

use axum::Router;
use burner_common::Signal;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{AppState, WebConfig, WebError, router};

pub struct WebServer {
    listener: TcpListener,
    router: Router,
}

impl WebServer {
    /// Bind the configured address and build the routes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn new(config: &WebConfig, state: AppState) -> Result<Self, WebError> {
        let listener = TcpListener::bind(&config.listen)
            .await
            .map_err(|e| WebError::BindError {
                address: config.listen.clone(),
                source: e,
            })?;

        tracing::info!(address = %config.listen, "HTTP server bound successfully");

        let router = router(state).layer(TimeoutLayer::new(config.timeout()));

        Ok(Self { listener, router })
    }

    /// # Errors
    ///
    /// If the socket has gone away.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the server until the shutdown signal is received
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a runtime error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), WebError> {
        tracing::info!("HTTP server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
