pub mod address;
pub mod error;
pub mod logging;
pub mod message;
pub mod policy;
pub mod status;
pub mod traits;

pub use tracing;

/// Broadcast to every long-running task when the process is asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
