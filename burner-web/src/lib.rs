//! Read-only HTTP view of the disposable mailboxes.
//!
//! # Endpoints
//!
//! - **`/api/stats`** - Messages processed, start time, domain and retention
//! - **`/api/alias`** - A placeholder alias to suggest to visitors
//! - **`/api/mailbox/{alias}`** - Summaries of the messages held for an alias, newest first
//! - **`/api/mail/{id}`** - One message with its headers and decoded body
//! - **`/api/mail/{id}/raw`** - The message exactly as received, as an `.eml` download

mod alias;
mod config;
mod error;
mod handlers;
mod server;

pub use alias::AliasGenerator;
pub use config::WebConfig;
pub use error::WebError;
pub use handlers::{AppState, router};
pub use server::WebServer;
