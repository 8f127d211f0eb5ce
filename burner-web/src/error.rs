use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebError {
    /// Failed to bind to the specified address
    #[error("Failed to bind HTTP server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// HTTP server encountered a runtime error
    #[error("HTTP server error: {0}")]
    ServerError(String),
}
