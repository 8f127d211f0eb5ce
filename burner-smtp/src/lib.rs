pub mod command;
pub mod config;
pub mod delivery;
pub mod error;
pub mod listener;
pub mod session;

pub use config::SmtpConfig;
pub use delivery::{Delivery, Phase};
pub use error::DeliveryError;
pub use listener::Listener;
pub use session::{Session, SessionConfig};
