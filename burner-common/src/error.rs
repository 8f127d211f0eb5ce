//! Error types shared between the receiving side and the store.

use std::io;

use thiserror::Error;

/// Errors that end an SMTP session early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client broke the protocol badly enough that the session ended.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection error occurred.
    #[error("Connection error: {0}")]
    Connection(#[from] io::Error),

    /// Shutdown signal received.
    #[error("Shutdown requested")]
    Shutdown,

    /// The client went quiet for too long.
    #[error("Session timed out after {0} seconds")]
    Timeout(u64),
}

impl SessionError {
    /// Returns `true` if the error indicates a graceful shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Returns `true` if the error is a client-side issue.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Timeout(_))
    }
}

/// Errors raised by a network listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to socket address.
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("Failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}

/// A byte stream that is not a mail message at all.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed message headers: {0}")]
    Headers(#[from] mailparse::MailParseError),
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn session_error_classification() {
        let err = SessionError::Shutdown;
        assert!(err.is_shutdown());
        assert!(!err.is_client_error());

        let err = SessionError::Protocol("line too long".to_string());
        assert!(!err.is_shutdown());
        assert!(err.is_client_error());

        let err = SessionError::Timeout(60);
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Session timed out after 60 seconds");

        let err = SessionError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(!err.is_shutdown());
        assert!(!err.is_client_error());
    }

    #[test]
    fn listener_error_keeps_source() {
        let err = ListenerError::BindFailed {
            address: "[::]:25".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert_eq!(err.to_string(), "Failed to bind to [::]:25: denied");
        assert!(err.source().is_some());
    }
}
